#![no_main]

//! Fuzz target for period labels and bounds

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use self_review::periods::ReviewPeriod;

#[derive(Arbitrary, Debug)]
struct PeriodInput {
    label: String,
    year: i32,
}

fuzz_target!(|input: PeriodInput| {
    if let Ok(period) = input.label.parse::<ReviewPeriod>() {
        let _ = period.display_name(input.year);
        if let Ok((start, end)) = period.bounds(input.year) {
            assert!(start < end);
        }
    }
});
