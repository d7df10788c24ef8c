//! Block height specifiers: absolute heights or offsets counted back from the tip.

use std::str::FromStr;

use bitcoin::BlockHash;

use crate::chain::{ChainError, ChainView};

/// A block height, either absolute or relative to the chain tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightSpec {
    /// Height above genesis (genesis is 0)
    Absolute(u32),
    /// Offset from the tip, inclusive: 1 is the tip itself
    FromTip(u32),
}

impl HeightSpec {
    /// Interpret a numeric height, negative values counting back from the tip
    pub fn from_offset(value: i64) -> Result<Self, ChainError> {
        let magnitude = u32::try_from(value.unsigned_abs())
            .map_err(|_| ChainError::InvalidHeight(value.to_string()))?;
        if value < 0 {
            Ok(HeightSpec::FromTip(magnitude))
        } else {
            Ok(HeightSpec::Absolute(magnitude))
        }
    }
}

impl FromStr for HeightSpec {
    type Err = ChainError;

    /// Parse `"12"` or `"-1"`. `"-0"` is rejected since it could mean genesis or the tip.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(offset) => {
                let offset: u32 = offset
                    .parse()
                    .map_err(|_| ChainError::InvalidHeight(s.to_string()))?;
                if offset == 0 {
                    return Err(ChainError::InvalidHeight(format!("{s} is ambiguous")));
                }
                Ok(HeightSpec::FromTip(offset))
            }
            None => s
                .parse()
                .map(HeightSpec::Absolute)
                .map_err(|_| ChainError::InvalidHeight(s.to_string())),
        }
    }
}

/// Resolve `spec` to an absolute height on a chain whose tip is at `tip_height`
pub fn resolve_height(spec: HeightSpec, tip_height: u32) -> Result<u32, ChainError> {
    let block_count = tip_height as u64 + 1;
    match spec {
        HeightSpec::Absolute(height) if height <= tip_height => Ok(height),
        HeightSpec::Absolute(height) => Err(ChainError::HeightOutOfRange {
            height: height as i64,
            tip: tip_height,
        }),
        HeightSpec::FromTip(offset) if offset >= 1 && offset as u64 <= block_count => {
            Ok((block_count - offset as u64) as u32)
        }
        HeightSpec::FromTip(offset) => Err(ChainError::HeightOutOfRange {
            height: -(offset as i64),
            tip: tip_height,
        }),
    }
}

/// Resolve `spec` against `chain` and return the hash of the block at that height
pub fn block_hash_for<C: ChainView + ?Sized>(
    chain: &C,
    spec: HeightSpec,
) -> Result<BlockHash, ChainError> {
    let tip_height = chain
        .tip_height()
        .ok_or_else(|| ChainError::NotFound("chain is empty".to_string()))?;
    let height = resolve_height(spec, tip_height)?;
    chain
        .block_hash_at(height)
        .ok_or_else(|| ChainError::NotFound(format!("no block at height {height}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainView;
    use bitcoin::hashes::Hash;

    fn resolve(s: &str, tip: u32) -> Result<u32, ChainError> {
        resolve_height(s.parse()?, tip)
    }

    #[test]
    fn test_resolve_absolute_heights() {
        assert_eq!(resolve("0", 107).unwrap(), 0);
        assert_eq!(resolve("107", 107).unwrap(), 107);
        assert!(matches!(
            resolve("108", 107),
            Err(ChainError::HeightOutOfRange {
                height: 108,
                tip: 107
            })
        ));
    }

    #[test]
    fn test_resolve_heights_from_tip() {
        assert_eq!(resolve("-1", 107).unwrap(), 107);
        assert_eq!(resolve("-2", 107).unwrap(), 106);
        assert_eq!(resolve("-20", 107).unwrap(), 88);
        assert_eq!(resolve("-107", 107).unwrap(), 1);
        assert_eq!(resolve("-108", 107).unwrap(), 0);
        assert!(matches!(
            resolve("-109", 107),
            Err(ChainError::HeightOutOfRange {
                height: -109,
                tip: 107
            })
        ));
    }

    #[test]
    fn test_reject_ambiguous_and_garbage() {
        assert!(matches!(
            "-0".parse::<HeightSpec>(),
            Err(ChainError::InvalidHeight(_))
        ));
        assert!(matches!(
            "tip".parse::<HeightSpec>(),
            Err(ChainError::InvalidHeight(_))
        ));
        assert!(matches!(
            "-".parse::<HeightSpec>(),
            Err(ChainError::InvalidHeight(_))
        ));
    }

    #[test]
    fn test_numeric_offsets() {
        assert_eq!(HeightSpec::from_offset(-1).unwrap(), HeightSpec::FromTip(1));
        assert_eq!(HeightSpec::from_offset(0).unwrap(), HeightSpec::Absolute(0));
        assert_eq!(resolve_height(HeightSpec::from_offset(-2).unwrap(), 107).unwrap(), 106);
        assert!(HeightSpec::from_offset(i64::MIN).is_err());
        assert!(resolve_height(HeightSpec::FromTip(u32::MAX), u32::MAX).is_ok());
    }

    #[test]
    fn test_block_hash_for_uses_chain() {
        let hash = BlockHash::from_byte_array([5u8; 32]);
        let mut chain = MockChainView::new();
        chain.expect_tip_height().returning(|| Some(10));
        chain
            .expect_block_hash_at()
            .withf(|height| *height == 9)
            .returning(move |_| Some(hash));
        assert_eq!(block_hash_for(&chain, HeightSpec::FromTip(2)).unwrap(), hash);

        let mut empty = MockChainView::new();
        empty.expect_tip_height().returning(|| None);
        assert!(matches!(
            block_hash_for(&empty, HeightSpec::Absolute(0)),
            Err(ChainError::NotFound(_))
        ));
    }
}
