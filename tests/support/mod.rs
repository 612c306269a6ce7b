//! Minimal JPEG segment walker shared by the integration tests.
//!
//! Walks marker segments and skips entropy-coded scan bodies, honoring
//! byte stuffing and restart markers. An unstuffed 0xFF inside a scan
//! body shows up as a bogus segment, which the tests then reject.
#![allow(dead_code)]

/// One marker segment with its payload (length bytes stripped).
#[derive(Debug, Clone)]
pub struct Segment {
    /// Marker code (the byte after 0xFF)
    pub marker: u8,
    /// Segment payload, empty for parameterless markers
    pub payload: Vec<u8>,
}

/// Parsed stream: every segment in order.
#[derive(Debug)]
pub struct ParsedStream {
    segments: Vec<Segment>,
}

impl ParsedStream {
    /// All segments in stream order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments with the given marker.
    pub fn count(&self, marker: u8) -> usize {
        self.segments.iter().filter(|s| s.marker == marker).count()
    }

    /// First segment with the given marker.
    pub fn first(&self, marker: u8) -> Option<&Segment> {
        self.segments.iter().find(|s| s.marker == marker)
    }

    /// Every segment with the given marker.
    pub fn all(&self, marker: u8) -> Vec<&Segment> {
        self.segments.iter().filter(|s| s.marker == marker).collect()
    }
}

/// Parses a complete JPEG byte stream into its segments.
pub fn parse_stream(data: &[u8]) -> ParsedStream {
    let mut segments = Vec::new();
    let mut i = 0usize;

    assert!(data.len() >= 4, "stream too short");
    assert_eq!(&data[0..2], &[0xFF, 0xD8], "missing SOI");
    segments.push(Segment {
        marker: 0xD8,
        payload: Vec::new(),
    });
    i += 2;

    while i + 1 < data.len() {
        assert_eq!(data[i], 0xFF, "expected marker at offset {i}");
        let marker = data[i + 1];
        i += 2;
        match marker {
            0xD9 => {
                segments.push(Segment {
                    marker,
                    payload: Vec::new(),
                });
                break;
            }
            0xD0..=0xD7 | 0x01 => {
                segments.push(Segment {
                    marker,
                    payload: Vec::new(),
                });
            }
            _ => {
                let length = ((data[i] as usize) << 8) | data[i + 1] as usize;
                assert!(length >= 2, "bad segment length for 0x{marker:02X}");
                let payload = data[i + 2..i + length].to_vec();
                i += length;
                segments.push(Segment { marker, payload });
                if marker == 0xDA {
                    // Skip the entropy-coded body.
                    while i + 1 < data.len() {
                        if data[i] != 0xFF {
                            i += 1;
                            continue;
                        }
                        match data[i + 1] {
                            0x00 => i += 2,
                            0xD0..=0xD7 => i += 2,
                            _ => break,
                        }
                    }
                }
            }
        }
    }
    ParsedStream { segments }
}
