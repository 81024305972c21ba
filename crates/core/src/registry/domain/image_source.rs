use std::path::Path;

/// A reference photo offered for enrolment.
#[derive(Clone, Copy, Debug)]
pub enum ImageSource<'a> {
    Path(&'a Path),
    /// Encoded image bytes (PNG, JPEG, ...) stored under `key`.
    Bytes { key: &'a str, data: &'a [u8] },
}

impl ImageSource<'_> {
    /// The key the resulting encoding is stored under.
    pub fn reference(&self) -> String {
        match self {
            ImageSource::Path(path) => path.to_string_lossy().into_owned(),
            ImageSource::Bytes { key, .. } => (*key).to_string(),
        }
    }
}
