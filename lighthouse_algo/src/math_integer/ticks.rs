// Arithmetic on capture timer timestamps.
// The capture counter is free running and wraps at 2^24, so every difference
// between two timestamps has to be taken modulo that period.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Period of the capture counter.
pub const TICK_MODULUS: u32 = 1 << 24;

/// Mask selecting the valid bits of a capture timestamp.
pub const TICK_MASK: u32 = TICK_MODULUS - 1;

/// Forward distance from `start` to `end` on the 2^24 tick clock.
///
/// # Arguments
/// * `start` - Earlier timestamp
/// * `end` - Later timestamp, may have wrapped past zero
///
/// # Returns
/// Number of ticks elapsed, in `0..TICK_MODULUS`
#[inline(always)]
pub const fn delta_ticks(start: u32, end: u32) -> u32 {
    end.wrapping_sub(start) & TICK_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference formula: (start > end) ? (2^24 - start) + end : end - start
    fn reference(start: u32, end: u32) -> u32 {
        if start > end {
            (TICK_MODULUS - start) + end
        } else {
            end - start
        }
    }

    #[test]
    fn forward_distance_without_wrap() {
        assert_eq!(delta_ticks(100, 3_100), 3_000);
        assert_eq!(delta_ticks(7, 7), 0);
    }

    #[test]
    fn forward_distance_across_wrap() {
        assert_eq!(delta_ticks(TICK_MASK, 0), 1);
        assert_eq!(delta_ticks(TICK_MODULUS - 1_000, 2_000), 3_000);
    }

    #[test]
    fn matches_reference_over_the_whole_domain() {
        // Stride through the counter domain with a step coprime to 2^24
        let step = 104_729;
        let mut start = 0u32;
        for _ in 0..400 {
            let mut end = 3u32;
            for _ in 0..160 {
                assert_eq!(delta_ticks(start, end), reference(start, end));
                // Moving forward by the delta from start must land on end
                assert_eq!((start + delta_ticks(start, end)) & TICK_MASK, end);
                end = (end + step) & TICK_MASK;
            }
            start = (start + step * 3) & TICK_MASK;
        }
    }
}
