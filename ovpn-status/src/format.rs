//! Human-readable byte counts.

const UNITS: [&str; 6] = ["B", "K", "M", "G", "T", "P"];

/// Binary (1024-based) scaling. Below 1024 the bare integer is printed with
/// `B`; above, one decimal place rounded half-up (`828967` → `809.5K`).
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let value = u128::from(bytes);
    let mut unit = 0usize;
    let mut divisor: u128 = 1;
    while unit + 1 < UNITS.len() && value >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    let mut tenths = round_tenths(value, divisor);
    // 1048575 rounds to 1024.0K; promote so it reads 1.0M.
    if tenths >= 10_240 && unit + 1 < UNITS.len() {
        divisor *= 1024;
        unit += 1;
        tenths = round_tenths(value, divisor);
    }

    format!("{}.{}{}", tenths / 10, tenths % 10, UNITS[unit])
}

fn round_tenths(value: u128, divisor: u128) -> u128 {
    (value * 20 + divisor) / (divisor * 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0B")]
    #[case(1, "1B")]
    #[case(1023, "1023B")]
    #[case(1024, "1.0K")]
    #[case(1536, "1.5K")]
    #[case(828_967, "809.5K")]
    #[case(1_048_575, "1.0M")]
    #[case(1_048_576, "1.0M")]
    #[case(5_368_709_120, "5.0G")]
    #[case(1_099_511_627_776, "1.0T")]
    #[case(1_125_899_906_842_624, "1.0P")]
    fn formats_binary_units(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[test]
    fn exact_half_rounds_up() {
        // 1280 / 1024 = 1.25 exactly
        assert_eq!(format_bytes(1280), "1.3K");
        // 1075 / 1024 = 1.0498
        assert_eq!(format_bytes(1075), "1.0K");
    }

    #[test]
    fn largest_value_stays_in_petabytes() {
        assert!(format_bytes(u64::MAX).ends_with('P'));
    }
}
