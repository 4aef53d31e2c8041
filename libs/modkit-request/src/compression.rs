//! Request/response payload compression.
//!
//! Codecs are push-based: bytes go in chunk by chunk and whatever output is
//! ready comes back, so both the outgoing body encoder and the response
//! decoder can stream without buffering the whole payload.

use bytes::Bytes;
use flate2::write::{
    DeflateDecoder, DeflateEncoder, GzDecoder, GzEncoder, ZlibDecoder, ZlibEncoder,
};
use http::HeaderMap;
use std::io::{self, Write};

/// Compression scheme applied to the request body and expected on the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum Compression {
    /// No compression, no `Content-Encoding` header
    #[default]
    None,
    /// gzip (`Content-Encoding: gzip`)
    Gzip,
    /// Raw deflate stream without zlib framing (`Content-Encoding: deflate`)
    Deflate,
    /// zlib-wrapped deflate (`Content-Encoding: deflate`)
    Zlib,
}

impl Compression {
    /// Wire value of `Content-Encoding` for this codec.
    #[must_use]
    pub fn token(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gzip"),
            Compression::Deflate | Compression::Zlib => Some("deflate"),
        }
    }

    /// Compress a complete payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the encoder fails.
    pub fn compress(self, data: &[u8]) -> io::Result<Bytes> {
        match self.encoder() {
            Some(mut encoder) => {
                let mut out = encoder.push(data)?.to_vec();
                out.extend_from_slice(&encoder.finish()?);
                Ok(Bytes::from(out))
            }
            None => Ok(Bytes::copy_from_slice(data)),
        }
    }

    pub(crate) fn encoder(self) -> Option<Encoder> {
        let level = flate2::Compression::default();
        match self {
            Compression::None => None,
            Compression::Gzip => Some(Encoder::Gzip(GzEncoder::new(Vec::new(), level))),
            Compression::Deflate => Some(Encoder::Deflate(DeflateEncoder::new(Vec::new(), level))),
            Compression::Zlib => Some(Encoder::Zlib(ZlibEncoder::new(Vec::new(), level))),
        }
    }

    /// Decoder for a response, only when its `Content-Encoding` is exactly
    /// this codec's token. Anything else passes through undecoded.
    pub(crate) fn decoder_for(self, headers: &HeaderMap) -> Option<Decoder> {
        let token = self.token()?;
        let observed = headers.get(http::header::CONTENT_ENCODING)?;
        if observed.as_bytes() != token.as_bytes() {
            return None;
        }
        match self {
            Compression::None => None,
            Compression::Gzip => Some(Decoder::Gzip(GzDecoder::new(Vec::new()))),
            Compression::Deflate => Some(Decoder::Deflate(DeflateDecoder::new(Vec::new()))),
            Compression::Zlib => Some(Decoder::Zlib(ZlibDecoder::new(Vec::new()))),
        }
    }
}

pub(crate) enum Encoder {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
    Zlib(ZlibEncoder<Vec<u8>>),
}

impl Encoder {
    pub(crate) fn push(&mut self, data: &[u8]) -> io::Result<Bytes> {
        let out = match self {
            Encoder::Gzip(e) => {
                e.write_all(data)?;
                e.get_mut()
            }
            Encoder::Deflate(e) => {
                e.write_all(data)?;
                e.get_mut()
            }
            Encoder::Zlib(e) => {
                e.write_all(data)?;
                e.get_mut()
            }
        };
        Ok(Bytes::from(std::mem::take(out)))
    }

    pub(crate) fn finish(self) -> io::Result<Bytes> {
        let out = match self {
            Encoder::Gzip(e) => e.finish()?,
            Encoder::Deflate(e) => e.finish()?,
            Encoder::Zlib(e) => e.finish()?,
        };
        Ok(Bytes::from(out))
    }
}

pub(crate) enum Decoder {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(DeflateDecoder<Vec<u8>>),
    Zlib(ZlibDecoder<Vec<u8>>),
}

impl Decoder {
    pub(crate) fn push(&mut self, data: &[u8]) -> io::Result<Bytes> {
        let out = match self {
            Decoder::Gzip(d) => {
                d.write_all(data)?;
                d.get_mut()
            }
            Decoder::Deflate(d) => {
                d.write_all(data)?;
                d.get_mut()
            }
            Decoder::Zlib(d) => {
                d.write_all(data)?;
                d.get_mut()
            }
        };
        Ok(Bytes::from(std::mem::take(out)))
    }

    pub(crate) fn finish(self) -> io::Result<Bytes> {
        let out = match self {
            Decoder::Gzip(d) => d.finish()?,
            Decoder::Deflate(d) => d.finish()?,
            Decoder::Zlib(d) => d.finish()?,
        };
        Ok(Bytes::from(out))
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Decoder::Gzip(_) => "gzip",
            Decoder::Deflate(_) => "deflate",
            Decoder::Zlib(_) => "zlib",
        };
        f.debug_tuple("Decoder").field(&name).finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::HeaderValue;
    use std::io::Read;

    const PLAIN: &[u8] = b"Hello, this payload travels compressed and comes back intact.";

    fn inflate(codec: Compression, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        match codec {
            Compression::Gzip => flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .unwrap(),
            Compression::Deflate => flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .unwrap(),
            Compression::Zlib => flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .unwrap(),
            Compression::None => return data.to_vec(),
        };
        out
    }

    fn headers_with_encoding(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_ENCODING,
            HeaderValue::from_static(value),
        );
        headers
    }

    #[test]
    fn test_tokens() {
        assert_eq!(Compression::None.token(), None);
        assert_eq!(Compression::Gzip.token(), Some("gzip"));
        assert_eq!(Compression::Deflate.token(), Some("deflate"));
        assert_eq!(Compression::Zlib.token(), Some("deflate"));
    }

    #[test]
    fn test_compress_is_readable_by_standard_decoders() {
        for codec in [Compression::Gzip, Compression::Deflate, Compression::Zlib] {
            let compressed = codec.compress(PLAIN).unwrap();
            assert_ne!(compressed.as_ref(), PLAIN, "{codec:?} should transform data");
            assert_eq!(inflate(codec, &compressed), PLAIN, "{codec:?}");
        }
    }

    #[test]
    fn test_none_compress_is_identity() {
        assert_eq!(Compression::None.compress(PLAIN).unwrap().as_ref(), PLAIN);
    }

    #[test]
    fn test_streaming_encoder_matches_standard_decoder() {
        let mut encoder = Compression::Gzip.encoder().unwrap();
        let mut out = Vec::new();
        for chunk in PLAIN.chunks(7) {
            out.extend_from_slice(&encoder.push(chunk).unwrap());
        }
        out.extend_from_slice(&encoder.finish().unwrap());

        assert_eq!(inflate(Compression::Gzip, &out), PLAIN);
    }

    #[test]
    fn test_decoder_requires_exact_token() {
        assert!(
            Compression::Gzip
                .decoder_for(&headers_with_encoding("gzip"))
                .is_some()
        );
        assert!(
            Compression::Gzip
                .decoder_for(&headers_with_encoding("deflate"))
                .is_none()
        );
        assert!(
            Compression::Gzip
                .decoder_for(&headers_with_encoding("gzip, br"))
                .is_none()
        );
        assert!(Compression::Gzip.decoder_for(&HeaderMap::new()).is_none());
        assert!(
            Compression::None
                .decoder_for(&headers_with_encoding("gzip"))
                .is_none()
        );
        assert!(
            Compression::Zlib
                .decoder_for(&headers_with_encoding("deflate"))
                .is_some()
        );
    }

    #[test]
    fn test_streaming_decoder_round_trip() {
        for codec in [Compression::Gzip, Compression::Deflate, Compression::Zlib] {
            let compressed = codec.compress(PLAIN).unwrap();
            let headers = headers_with_encoding(codec.token().unwrap());
            let mut decoder = codec.decoder_for(&headers).unwrap();

            let mut out = Vec::new();
            for chunk in compressed.chunks(5) {
                out.extend_from_slice(&decoder.push(chunk).unwrap());
            }
            out.extend_from_slice(&decoder.finish().unwrap());
            assert_eq!(out, PLAIN, "{codec:?}");
        }
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        let mut decoder = Compression::Gzip
            .decoder_for(&headers_with_encoding("gzip"))
            .unwrap();
        let pushed = decoder.push(b"definitely not gzip data");
        let result = pushed.and_then(|_| decoder.finish());
        assert!(result.is_err());
    }
}
