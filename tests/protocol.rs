use std::io::Cursor;
use tilefind::protocol::*;
use tilefind::{ProtocolError, RemoteClump, Strand, status_value};

#[test]
fn test_command_parse() {
    let line = format!("{SIGNATURE}query 1234");
    assert_eq!(Command::parse(&line).unwrap(), Command::Query { size: 1234 });
    let line = format!("{SIGNATURE}pcr acgtacgtacgt ttgcaggctaat 4000\n");
    assert_eq!(
        Command::parse(&line).unwrap(),
        Command::Pcr {
            f_primer: "acgtacgtacgt".to_string(),
            r_primer: "ttgcaggctaat".to_string(),
            max_distance: 4000,
        }
    );
    for cmd in [
        Command::ProtQuery { size: 9 },
        Command::TransQuery { size: 30 },
        Command::Status,
        Command::Files,
        Command::Quit,
    ] {
        let req = cmd.to_request();
        assert!(req.starts_with(SIGNATURE) && req.ends_with('\n'));
        assert_eq!(Command::parse(&req).unwrap(), cmd);
    }
    assert_eq!(Command::TransQuery { size: 30 }.upload_size(), Some(30));
    assert_eq!(Command::Status.upload_size(), None);
}

#[test]
fn test_command_parse_errors() {
    assert!(matches!(Command::parse("status"), Err(ProtocolError::NoSignature)));
    assert!(matches!(Command::parse(SIGNATURE), Err(ProtocolError::Truncated)));
    assert!(matches!(
        Command::parse(&format!("{SIGNATURE}dance")),
        Err(ProtocolError::UnknownCommand(w)) if w == "dance"
    ));
    assert!(matches!(
        Command::parse(&format!("{SIGNATURE}query lots")),
        Err(ProtocolError::BadArgument { command: "query", .. })
    ));
    assert!(matches!(
        Command::parse(&format!("{SIGNATURE}pcr acgt")),
        Err(ProtocolError::BadArgument { command: "pcr", .. })
    ));
}

#[test]
fn test_read_request() {
    let mut r = Cursor::new(format!("{SIGNATURE}status\nrest").into_bytes());
    assert_eq!(read_request(&mut r).unwrap(), format!("{SIGNATURE}status"));

    let long = "x".repeat(MAX_REQUEST + 10);
    assert!(matches!(
        read_request(&mut Cursor::new(long.into_bytes())),
        Err(ProtocolError::LineTooLong(_))
    ));
    assert!(matches!(
        read_request(&mut Cursor::new(Vec::new())),
        Err(ProtocolError::Truncated)
    ));
}

#[test]
fn test_short_and_long_strings() {
    let mut buf = Vec::new();
    send_string(&mut buf, "hello").unwrap();
    send_long_string(&mut buf, &"7 9 ".repeat(100)).unwrap();
    send_string(&mut buf, "").unwrap();
    assert_eq!(buf[0], 5);
    assert_eq!(&buf[6..8], &400u16.to_be_bytes());

    let mut r = Cursor::new(buf);
    assert_eq!(recv_string(&mut r).unwrap(), "hello");
    assert_eq!(recv_long_string(&mut r).unwrap().len(), 400);
    assert_eq!(recv_string(&mut r).unwrap(), "");
    assert!(matches!(recv_string(&mut r), Err(ProtocolError::Io(_))));

    assert!(matches!(
        send_string(&mut Vec::new(), &"x".repeat(256)),
        Err(ProtocolError::LineTooLong(256))
    ));
}

#[test]
fn test_error_lines() {
    assert!(check_error("10\t20\tchr1\t5\t15\t2").is_ok());
    assert!(matches!(
        check_error("Error: out of memory. Try reducing size of query."),
        Err(ProtocolError::Server(msg)) if msg.starts_with("out of memory")
    ));
}

#[test]
fn test_clump_lines() {
    let plain = RemoteClump::parse_line("0\t20\tchr1\t500\t520\t10", 6).unwrap();
    assert_eq!((plain.q_start, plain.q_end, plain.t_start, plain.t_end), (0, 20, 500, 520));
    assert_eq!(plain.target, "chr1");
    assert_eq!(plain.hit_count, 10);
    assert_eq!(plain.strand, None);
    assert_eq!(plain.to_line(), "0\t20\tchr1\t500\t520\t10");

    let prot = RemoteClump::parse_line("3 30 chr2 100 127 5 - 2", 8).unwrap();
    assert_eq!(prot.strand, Some(Strand::Reverse));
    assert_eq!((prot.q_frame, prot.t_frame), (None, Some(2)));
    assert_eq!(prot.to_line(), "3\t30\tchr2\t100\t127\t5\t-\t2");

    let trans = RemoteClump::parse_line("3\t30\tchr2\t100\t127\t5\t+\t1\t0", 9).unwrap();
    assert_eq!(trans.strand, Some(Strand::Forward));
    assert_eq!((trans.q_frame, trans.t_frame), (Some(1), Some(0)));
    assert_eq!(RemoteClump::parse_line(&trans.to_line(), 9).unwrap(), trans);

    assert!(RemoteClump::parse_line("0 20 chr1 500", 6).is_err());
    assert!(RemoteClump::parse_line("0 20 chr1 500 520 x", 6).is_err());
    assert!(RemoteClump::parse_line("0 20 chr1 500 520 2 ?", 8).is_err());
}

#[test]
fn test_hit_lists() {
    let hits = vec![(0, 100), (4, 104), (8, 108)];
    let line = format_hits(&hits, 1000);
    assert_eq!(line, "0 100 4 104 8 108");
    assert_eq!(parse_hits(&line).unwrap(), hits);
    // pairs that do not fit are dropped whole
    assert_eq!(format_hits(&hits, 12), "0 100 4 104");
    assert_eq!(parse_hits("").unwrap(), Vec::new());
    assert!(parse_hits("1 2 3").is_err());
    assert!(parse_hits("1 b").is_err());
}

#[test]
fn test_status_values() {
    let lines: Vec<String> = ["version 0.3.0", "tileSize 11", "blat requests 4", "bases 200"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(status_value(&lines, "blat requests"), Some("4"));
    assert_eq!(status_value(&lines, "tileSize"), Some("11"));
    assert_eq!(status_value(&lines, "misses"), None);
    assert_eq!(find_value("tileSize 4 stepSize 4", "stepSize"), Some("4"));
}
