use super::Error;
use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::ops::{Deref, DerefMut};

/// Data which can be extracted from a [`Response`].
pub trait Data: Sized {
    /// Decode the payload from a fully read response body.
    fn from_bytes(data: Bytes) -> Result<Self, Error>;

    /// Extract the payload from a response.
    ///
    /// The body is consumed within this call, on every path.
    fn from_response(response: Response) -> impl Future<Output = Result<Self, Error>> {
        async move {
            let response = response.error_for_status()?;
            Self::from_bytes(response.bytes().await?)
        }
    }
}

/// BLOB data
impl Data for Bytes {
    fn from_bytes(data: Bytes) -> Result<Self, Error> {
        Ok(data)
    }
}

/// String data
impl Data for String {
    fn from_bytes(data: Bytes) -> Result<Self, Error> {
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

/// JSON based data.
#[derive(Clone)]
pub struct Json<D>(pub D)
where
    D: DeserializeOwned;

impl<D> Data for Json<D>
where
    D: DeserializeOwned,
{
    fn from_bytes(data: Bytes) -> Result<Self, Error> {
        Ok(Self(serde_json::from_slice(&data)?))
    }
}

impl<D: DeserializeOwned> Json<D> {
    #[inline]
    pub fn into_inner(self) -> D {
        self.0
    }
}

impl<D: DeserializeOwned> Deref for Json<D> {
    type Target = D;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<D: DeserializeOwned> DerefMut for Json<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The "not found" instance.
///
/// A `404 Not Found` status, as well as an empty body, is reported as [`None`]
/// rather than an error. Other non-success statuses remain hard errors.
impl<D: Data> Data for Option<D> {
    fn from_bytes(data: Bytes) -> Result<Self, Error> {
        if data.is_empty() {
            return Ok(None);
        }
        D::from_bytes(data).map(Some)
    }

    async fn from_response(response: Response) -> Result<Self, Error> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status()?;
        Self::from_bytes(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Payload {
        name: String,
    }

    #[test]
    fn json_decodes() {
        let data = Bytes::from_static(br#"{"name":"example"}"#);
        let json = Json::<Payload>::from_bytes(data).expect("must decode");
        assert_eq!(json.name, "example");
    }

    #[test]
    fn json_decode_failure_is_an_error() {
        let data = Bytes::from_static(b"not json");
        assert!(Json::<Payload>::from_bytes(data).is_err());
    }

    #[test]
    fn empty_body_is_none() {
        let data = Bytes::new();
        let result = Option::<Json<Payload>>::from_bytes(data).expect("must not fail");
        assert!(result.is_none());
    }
}
