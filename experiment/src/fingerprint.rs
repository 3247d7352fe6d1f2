use std::{collections::BTreeSet, error::Error, fmt};

/// Why a structure string couldn't be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureErr {
    Empty,
    UnexpectedChar(char),
    UnbalancedBranch,
    UnclosedBracket,
    UnclosedRing(u32),
}

impl fmt::Display for StructureErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureErr::Empty => write!(f, "empty structure"),
            StructureErr::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            StructureErr::UnbalancedBranch => write!(f, "unbalanced branch parentheses"),
            StructureErr::UnclosedBracket => write!(f, "unclosed bracket atom"),
            StructureErr::UnclosedRing(label) => write!(f, "ring {label} is never closed"),
        }
    }
}

impl Error for StructureErr {}

/// Turns a structure string into a fixed width fingerprint.
pub trait FingerprintEncoder {
    /// The length of every fingerprint this encoder produces.
    fn width(&self) -> usize;

    /// Encodes one structure.
    ///
    /// # Errors
    /// If the structure can't be parsed, the caller drops the row.
    fn encode(&self, structure: &str) -> Result<Vec<f32>, StructureErr>;
}

/// A hashed path fingerprint: every run of up to `max_path` consecutive tokens of a line
/// notation structure sets one bit.
///
/// Ring closure labels are hashed as a plain ring marker, so renumbering rings doesn't change the
/// fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct PathFingerprint {
    width: usize,
    max_path: usize,
}

impl PathFingerprint {
    pub fn new(width: usize, max_path: usize) -> Self {
        Self {
            width: width.max(1),
            max_path: max_path.max(1),
        }
    }
}

impl FingerprintEncoder for PathFingerprint {
    fn width(&self) -> usize {
        self.width
    }

    fn encode(&self, structure: &str) -> Result<Vec<f32>, StructureErr> {
        let tokens = tokenize(structure)?;
        let mut bits = vec![0.; self.width];

        for start in 0..tokens.len() {
            let mut hash = FNV_OFFSET;
            for token in tokens[start..].iter().take(self.max_path) {
                hash = fnv1a(hash, token.as_bytes());
                hash = fnv1a(hash, b"|");
                bits[(hash % self.width as u64) as usize] = 1.;
            }
        }

        Ok(bits)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash
}

const BONDS: &str = "-=#$:/\\.";

/// Splits a line notation structure into atoms, bonds, branches and ring markers, checking
/// that brackets, branches and ring closures are balanced.
fn tokenize(structure: &str) -> Result<Vec<String>, StructureErr> {
    let structure = structure.trim();
    if structure.is_empty() {
        return Err(StructureErr::Empty);
    }

    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut rings = BTreeSet::new();
    let mut chars = structure.chars().peekable();

    let mut toggle_ring = |label: u32, tokens: &mut Vec<String>| {
        if !rings.remove(&label) {
            rings.insert(label);
        }
        tokens.push("ring".to_string());
    };

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let mut atom = String::from("[");
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('[') | None => return Err(StructureErr::UnclosedBracket),
                        Some(c) => atom.push(c),
                    }
                }
                atom.push(']');
                tokens.push(atom);
            }
            '(' => {
                depth += 1;
                tokens.push("(".to_string());
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or(StructureErr::UnbalancedBranch)?;
                tokens.push(")".to_string());
            }
            '%' => {
                let label = match (chars.next(), chars.next()) {
                    (Some(a), Some(b)) => a.to_digit(10).zip(b.to_digit(10)),
                    _ => None,
                };
                let (a, b) = label.ok_or(StructureErr::UnexpectedChar('%'))?;
                toggle_ring(10 * a + b, &mut tokens);
            }
            c if c.is_ascii_digit() => toggle_ring(c.to_digit(10).unwrap_or_default(), &mut tokens),
            'C' if chars.peek() == Some(&'l') => {
                chars.next();
                tokens.push("Cl".to_string());
            }
            'B' if chars.peek() == Some(&'r') => {
                chars.next();
                tokens.push("Br".to_string());
            }
            c if c.is_ascii_alphabetic() || c == '*' || BONDS.contains(c) => {
                tokens.push(c.to_string());
            }
            c => return Err(StructureErr::UnexpectedChar(c)),
        }
    }

    if depth != 0 {
        return Err(StructureErr::UnbalancedBranch);
    }

    if let Some(&label) = rings.iter().next() {
        return Err(StructureErr::UnclosedRing(label));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_structures_set_some_bits() {
        let encoder = PathFingerprint::new(256, 5);

        for structure in ["CCO", "c1ccccc1", "CC(=O)[O-]", "ClC(Br)Cl", "C%12CC%12"] {
            let bits = encoder.encode(structure).unwrap();
            assert_eq!(bits.len(), 256);
            assert!(bits.iter().any(|&b| b == 1.), "{structure}");
            assert!(bits.iter().all(|&b| b == 0. || b == 1.));
        }
    }

    #[test]
    fn encoding_is_deterministic_and_label_independent() {
        let encoder = PathFingerprint::new(1024, 7);

        assert_eq!(encoder.encode("C1CC1").unwrap(), encoder.encode("C2CC2").unwrap());
        assert_eq!(encoder.encode("CCN").unwrap(), encoder.encode("CCN").unwrap());
        assert_ne!(encoder.encode("CCN").unwrap(), encoder.encode("CCO").unwrap());
    }

    #[test]
    fn malformed_structures_fail() {
        let encoder = PathFingerprint::new(64, 3);

        assert_eq!(encoder.encode("  "), Err(StructureErr::Empty));
        assert_eq!(encoder.encode("C(C"), Err(StructureErr::UnbalancedBranch));
        assert_eq!(encoder.encode("CC)"), Err(StructureErr::UnbalancedBranch));
        assert_eq!(encoder.encode("C[NH4"), Err(StructureErr::UnclosedBracket));
        assert_eq!(encoder.encode("C1CC"), Err(StructureErr::UnclosedRing(1)));
        assert_eq!(encoder.encode("C C"), Err(StructureErr::UnexpectedChar(' ')));
        assert_eq!(encoder.encode("C%1"), Err(StructureErr::UnexpectedChar('%')));
    }
}
