//! Assertion macros for realtime frames

#![allow(unused_macros)]

/// Assert that a result is ok and return the value
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Find the single frame named `$event` in a list of frames
macro_rules! expect_event {
    ($frames:expr, $event:expr) => {{
        let frames = &$frames;
        let name: String = $event.to_string();
        let matching: Vec<_> = frames.iter().filter(|f| f.event == name).collect();
        assert_eq!(
            matching.len(),
            1,
            "expected exactly one `{}` frame, got {:?}",
            name,
            frames.iter().map(|f| f.event.as_str()).collect::<Vec<_>>()
        );
        matching[0].clone()
    }};
}

/// Assert that no frame named `$event` is in a list of frames
macro_rules! expect_no_event {
    ($frames:expr, $event:expr) => {{
        let frames = &$frames;
        let name: String = $event.to_string();
        assert!(
            frames.iter().all(|f| f.event != name),
            "unexpected `{}` frame",
            name
        );
    }};
}
