use std::fmt;
use std::ops::{BitAnd, BitXor};

use itertools::izip;
use rand::distributions::{Distribution, Standard};
use rand::Rng;

use crate::consts::{ID_LEN, ID_LEN_BITS};
use crate::error::{Error, Result};

/// A 160-bit node identifier, big-endian.
///
/// Ids compare as unsigned integers; the XOR of two ids is their
/// routing distance.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Id(#[cfg_attr(feature = "serde", serde(with = "hex::serde"))] pub [u8; ID_LEN]);

impl Id {
    pub const ZERO: Id = Id([0; ID_LEN]);
    pub const ONE: Id = {
        let mut raw = [0; ID_LEN];
        raw[ID_LEN - 1] = 1;
        Id(raw)
    };
    pub const MAX: Id = Id([0xff; ID_LEN]);

    /// Decodes a raw big-endian octet string of exactly [`ID_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| Error::BadEncoding(format!("expected {ID_LEN} bytes, got {}", bytes.len())))?;
        Ok(Id(raw))
    }

    /// Decodes exactly `2 * ID_LEN` hex digits, upper or lower case.
    pub fn from_hex(hex_id: &str) -> Result<Self> {
        if hex_id.len() != 2 * ID_LEN {
            return Err(Error::BadEncoding(format!(
                "expected {} hex digits, got {}",
                2 * ID_LEN,
                hex_id.len()
            )));
        }
        let mut raw = [0u8; ID_LEN];
        hex::decode_to_slice(hex_id, &mut raw).map_err(|x| Error::BadEncoding(x.to_string()))?;
        Ok(Id(raw))
    }

    /// Lowercase hex, always `2 * ID_LEN` digits.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn as_short_hex(&self) -> String {
        let hex_id = hex::encode(self.0);
        hex_id.trim_start_matches('0').to_owned()
    }

    pub fn leading_zeros(&self) -> u8 {
        let mut res = 0u8;
        for x in self.0 {
            if x == 0 {
                res += 8;
            } else {
                res += x.leading_zeros() as u8;
                break;
            }
        }
        res
    }

    pub fn wrapping_add(self, rhs: Id) -> Id {
        let mut res = [0u8; ID_LEN];
        let mut carry = 0u16;
        for i in (0..ID_LEN).rev() {
            let sum = self.0[i] as u16 + rhs.0[i] as u16 + carry;
            res[i] = sum as u8;
            carry = sum >> 8;
        }
        Id(res)
    }

    pub fn wrapping_sub(self, rhs: Id) -> Id {
        let mut res = [0u8; ID_LEN];
        let mut borrow = 0i16;
        for i in (0..ID_LEN).rev() {
            let diff = self.0[i] as i16 - rhs.0[i] as i16 - borrow;
            res[i] = diff.rem_euclid(256) as u8;
            borrow = i16::from(diff < 0);
        }
        Id(res)
    }

    pub fn shr1(self) -> Id {
        let mut res = [0u8; ID_LEN];
        let mut carry = 0u8;
        for (i, x) in self.0.iter().enumerate() {
            res[i] = (x >> 1) | (carry << 7);
            carry = x & 1;
        }
        Id(res)
    }

    /// Id with the `bits` least significant bits set.
    pub fn low_mask(bits: u8) -> Id {
        let mut res = [0u8; ID_LEN];
        let full = (bits / 8) as usize;
        for x in res.iter_mut().rev().take(full) {
            *x = 0xff;
        }
        let rem = bits % 8;
        if rem != 0 && full < ID_LEN {
            res[ID_LEN - 1 - full] = (1u8 << rem) - 1;
        }
        Id(res)
    }

    /// First id of the upper half of the inclusive range `[lo, hi]`,
    /// i.e. `lo + (hi - lo) / 2 + 1`.
    pub fn midpoint_upper(lo: Id, hi: Id) -> Id {
        lo.wrapping_add(hi.wrapping_sub(lo).shr1()).wrapping_add(Id::ONE)
    }

    /// Uniformly random id in the inclusive range `[lo, hi]`.
    ///
    /// Mask-and-reject: a candidate is drawn with only the span's
    /// significant bits set, so the expected number of draws is below two.
    pub fn random_in_range<R: Rng + ?Sized>(rng: &mut R, lo: Id, hi: Id) -> Id {
        debug_assert!(lo <= hi);
        let span = hi.wrapping_sub(lo);
        if span == Id::ZERO {
            return lo;
        }
        let mask = Id::low_mask(ID_LEN_BITS as u8 - span.leading_zeros());
        loop {
            let candidate = rng.gen::<Id>() & mask;
            if candidate <= span {
                return lo.wrapping_add(candidate);
            }
        }
    }
}

impl BitXor for Id {
    type Output = Id;

    fn bitxor(self, rhs: Id) -> Id {
        let mut res = Id([0u8; ID_LEN]);
        for (a, b, r) in izip!(&self.0, &rhs.0, &mut res.0) {
            *r = a ^ b;
        }
        res
    }
}

impl BitAnd for Id {
    type Output = Id;

    fn bitand(self, rhs: Id) -> Id {
        let mut res = Id([0u8; ID_LEN]);
        for (a, b, r) in izip!(&self.0, &rhs.0, &mut res.0) {
            *r = a & b;
        }
        res
    }
}

impl Distribution<Id> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Id {
        let mut raw = [0u8; ID_LEN];
        rng.fill_bytes(&mut raw);
        Id(raw)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_id = self.as_short_hex();
        f.debug_tuple("Id").field(&short_id).finish()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
