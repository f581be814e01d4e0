use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::Error;
use crate::ID_LENGTH;

/// A 160-bit identifier that addresses a DHT participant. Local identities and find_node targets
/// share this type.
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Hash, Default, Copy)]
pub struct NodeId(pub [u8; ID_LENGTH]);

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let hex_vec: Vec<String> = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{}", hex_vec.join(""))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl NodeId {
    /// Constructs a new `NodeId` from a byte array.
    pub fn new(data: [u8; ID_LENGTH]) -> Self {
        NodeId(data)
    }

    /// Constructs a new, uniformly random `NodeId`.
    pub fn rand() -> Self {
        NodeId(rand::random::<[u8; ID_LENGTH]>())
    }

    /// Returns the XOR result between `self` and `id`.
    pub fn xor(&self, id: &NodeId) -> NodeId {
        let mut ret = [0; ID_LENGTH];
        for (i, byte) in ret.iter_mut().enumerate() {
            *byte = self.0[i] ^ id.0[i];
        }
        NodeId(ret)
    }

    /// Returns the number of leading zeros in `self`. This is used to pick the k-bucket of a
    /// distance.
    pub fn leading_zeros(&self) -> usize {
        let mut ret = 0;
        for i in 0..ID_LENGTH {
            if self.0[i] == 0 {
                ret += 8
            } else {
                return ret + self.0[i].leading_zeros() as usize;
            }
        }
        ret
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = Error;

    /// Parses a 40 character hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != ID_LENGTH * 2 || !s.is_ascii() {
            return Err(Error::InvalidNodeId(s.to_string()));
        }
        let mut ret = [0u8; ID_LENGTH];
        for (i, byte) in ret.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidNodeId(s.to_string()))?;
        }
        Ok(NodeId(ret))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::NodeId;
    use crate::ID_LENGTH;

    #[test]
    fn test_leading_zeros() {
        for i in 0..ID_LENGTH * 8 {
            let mut bytes = [0u8; ID_LENGTH];
            bytes[i / 8] = 0x80 >> (i % 8);
            assert_eq!(NodeId(bytes).leading_zeros(), i);
        }
        assert_eq!(NodeId::default().leading_zeros(), ID_LENGTH * 8);
    }

    #[test]
    fn test_xor_is_symmetric() {
        let a = NodeId::rand();
        let b = NodeId::rand();
        assert_eq!(a.xor(&b), b.xor(&a));
        assert_eq!(a.xor(&a), NodeId::default());
    }

    #[test]
    fn test_parse_hex() {
        let text = "0123456789abcdef0123456789ABCDEF01234567";
        let id: NodeId = text.parse().unwrap();
        assert_eq!(id.0[0], 0x01);
        assert_eq!(id.0[19], 0x67);
        assert_eq!(id.to_string(), text.to_lowercase());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("abcd".parse::<NodeId>().is_err());
        assert!("zz23456789abcdef0123456789abcdef01234567".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_rand_is_fresh() {
        let ids: HashSet<NodeId> = (0..1000).map(|_| NodeId::rand()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
