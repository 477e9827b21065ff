#![no_main]
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use minicron::Schedule;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(schedule) = Schedule::parse(s, Utc) {
            let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
            if let Ok(next) = schedule.next(&start) {
                assert!(next > start);
                assert!(schedule.contains(&next));
            }
        }
    }
});
