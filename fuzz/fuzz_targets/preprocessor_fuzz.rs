#![no_main]

use libfuzzer_sys::fuzz_target;
use sparqlate::{QueryPreprocessor, SparqlQuery};

// Arbitrary text must either be rejected with an error or classify, and a
// classified query must survive patching and a second parse unchanged.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(mut pre) = QueryPreprocessor::parse(text) else {
        return;
    };
    let _ = pre.root_graph_pattern();
    let _ = pre.order_by_clause();
    pre.set_offset(3);
    pre.set_limit(7);

    let serialized = pre.serialize();
    if let Ok(again) = SparqlQuery::parse(&serialized) {
        assert_eq!(again.body(), serialized);
    }
});
