#![no_main]

use logbridge_ingest::parser::{SyslogFormat, SyslogParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for format in [SyslogFormat::Rfc3164, SyslogFormat::Rfc5424, SyslogFormat::Rfc6587] {
        let parser = SyslogParser::new(format);

        // 파싱 실패도 대체 레코드로 직렬화 가능해야 한다
        let record = match parser.parse(data) {
            Ok(record) => record,
            Err(e) => parser.fallback_record(data, &e),
        };
        serde_json::to_vec(&record).expect("record must serialize");
    }
});
