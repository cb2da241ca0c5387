#![no_main]

//! Fuzz target for rule predicate compilation.
//!
//! Arbitrary predicate text must either compile or produce a
//! `PredicateError`, and a compiled predicate must evaluate against any
//! record without panicking.

use libfuzzer_sys::fuzz_target;
use pokeproxy_core::{
    models::Record,
    rules::{first_match, Predicate, Rule},
};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let record = Record { name: text.to_string(), type_one: text.to_string(), ..Record::default() };

    if let Ok(predicate) = Predicate::compile(text) {
        let _ = predicate.matches(&record);
        let _ = predicate.matches(&Record::default());
    }

    let rules = [Rule::new("http://fuzz.test", "fuzz", text.split(';'))];
    let _ = first_match(&record, &rules);
});
