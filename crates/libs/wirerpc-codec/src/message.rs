use rmp_serde::{from_slice, Serializer};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CodecError, Result};

/// Capability required of every value crossing the codec boundary: params,
/// results and decode destinations.
///
/// Implemented for every serde type; payloads are encoded as msgpack maps so
/// peers can evolve their structs independently of field order.
pub trait Message: Sized {
    fn encode(&self) -> Result<Vec<u8>>;
    fn decode(bytes: &[u8]) -> Result<Self>;
}

impl<T> Message for T
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64);
        self.serialize(&mut Serializer::new(&mut buf).with_struct_map())
            .map_err(CodecError::not_serializable)?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        from_slice(bytes).map_err(CodecError::payload)
    }
}

/// Encoded params or result bytes, decoded only when a caller asks for a
/// concrete type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn encode<T: Message>(value: &T) -> Result<Self> {
        value.encode().map(Self)
    }

    pub fn decode<T: Message>(&self) -> Result<T> {
        T::decode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
