#![no_main]

use libfuzzer_sys::fuzz_target;
use sparqlate::QueryResult;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(QueryResult::Bindings { rows, .. }) = QueryResult::from_json(text) {
        for row in &rows {
            for (_, term) in row.iter() {
                let _ = term.to_value();
            }
        }
    }
});
