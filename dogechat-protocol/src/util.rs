use crate::Error;

/// Convenience trait to easily convert failures to `Error::MalformedFrame`
pub trait OptionExt<T> {
    fn or_malformed(self, reason: &str) -> Result<T, Error>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_malformed(self, reason: &str) -> Result<T, Error> {
        self.ok_or_else(|| Error::MalformedFrame(reason.into()))
    }
}
