use base64::{engine::general_purpose::URL_SAFE_NO_PAD, DecodeError, Engine as _};

#[inline]
pub fn encode<T: ?Sized + AsRef<[u8]>>(data: &T) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

#[inline]
pub fn decode<T: ?Sized + AsRef<[u8]>>(data: &T) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(data)
}
