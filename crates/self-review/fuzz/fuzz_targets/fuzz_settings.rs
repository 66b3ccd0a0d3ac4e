#![no_main]

//! Fuzz target for settings parsing
//!
//! Arbitrary text must either parse or fail with an error; validation and
//! author filter construction must never panic.

use libfuzzer_sys::fuzz_target;

use self_review::settings::Settings;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(settings) = Settings::from_toml(text)
    {
        let _ = settings.validate();
        let _ = settings.author_filter();
        let _ = settings.repo_paths();
    }
});
