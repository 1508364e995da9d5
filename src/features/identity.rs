/// Descriptors longer than this (in characters, after trimming) are swapped
/// for [`COMPACT_IDENTITY_DNA`] in size-sensitive requests.
pub const COMPACT_DNA_THRESHOLD: usize = 700;

pub const COMPACT_IDENTITY_DNA: &str = "LOCKED IDENTITY DNA (COMPACT) - DO NOT ALTER\n\
Same person as the reference image: identical face shape, eye shape and color, brows, nose, lips and smile.\n\
Identical skin tone and realistic skin texture with visible pores; no beautification or smoothing.\n\
Identical hair color, length, texture and parting, with natural flyaways.\n\
Identical body proportions and apparent age.\n\
Identity must remain identical (no face drift, no morphing, no age change).";

/// Pure function of length: short descriptors pass through trimmed, long
/// ones are replaced wholesale.
pub fn compact_master_dna(master_dna: &str) -> String {
    let trimmed = master_dna.trim();
    if trimmed.chars().count() <= COMPACT_DNA_THRESHOLD {
        return trimmed.to_string();
    }
    COMPACT_IDENTITY_DNA.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_descriptor_is_kept() {
        assert_eq!(compact_master_dna("  brown eyes, short hair \n"), "brown eyes, short hair");
    }

    #[test]
    fn threshold_is_inclusive_and_counts_characters() {
        let at_limit = "é".repeat(COMPACT_DNA_THRESHOLD);
        assert_eq!(compact_master_dna(&at_limit), at_limit);

        let over = "a".repeat(COMPACT_DNA_THRESHOLD + 1);
        assert_eq!(compact_master_dna(&over), COMPACT_IDENTITY_DNA);
    }
}
