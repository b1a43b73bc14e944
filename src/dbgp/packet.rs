//! DBGp packet framing: `<length>\0<xml declaration>\n<payload>\0`.

use std::io::{self, BufRead, Read};

/// Header preceding every payload, counted in the length prefix.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"iso-8859-1\"?>\n";

/// Frame a payload for the IDE.
pub fn frame(payload: &str) -> Vec<u8> {
    let len = XML_HEADER.len() + payload.len();
    let prefix = len.to_string();

    let mut packet = Vec::with_capacity(prefix.len() + len + 2);
    packet.extend_from_slice(prefix.as_bytes());
    packet.push(0);
    packet.extend_from_slice(XML_HEADER.as_bytes());
    packet.extend_from_slice(payload.as_bytes());
    packet.push(0);
    packet
}

/// Read a single framed packet the way an IDE does, return its payload without the header.
/// Return `None` on a clean end of stream.
pub fn read_packet<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut prefix = vec![];
    if reader.read_until(0, &mut prefix)? == 0 {
        return Ok(None);
    }
    if prefix.pop() != Some(0) {
        return Err(invalid_data("truncated length prefix"));
    }
    let len: usize = std::str::from_utf8(&prefix)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid_data("malformed length prefix"))?;

    let mut data = vec![0u8; len + 1];
    reader.read_exact(&mut data)?;
    if data.pop() != Some(0) {
        return Err(invalid_data("packet is not NUL terminated"));
    }

    let data = String::from_utf8(data).map_err(|e| invalid_data(&e.to_string()))?;
    data.strip_prefix(XML_HEADER)
        .map(|payload| Some(payload.to_string()))
        .ok_or_else(|| invalid_data("missing xml declaration"))
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame() {
        let payload = r#"<response command="status" transaction_id="1"/>"#;
        let packet = frame(payload);

        let nul = packet.iter().position(|&b| b == 0).unwrap();
        let declared: usize = std::str::from_utf8(&packet[..nul]).unwrap().parse().unwrap();
        assert_eq!(declared, XML_HEADER.len() + payload.len());
        assert_eq!(declared, 44 + payload.len());
        assert_eq!(packet.len(), nul + 1 + declared + 1);
        assert_eq!(packet.last(), Some(&0));
    }

    #[test]
    fn test_read_framed() {
        let payloads = ["", "<init/>", "<response>ünïcödé</response>"];
        let stream: Vec<u8> = payloads.iter().flat_map(|p| frame(p)).collect();

        let mut reader = Cursor::new(stream);
        for payload in payloads {
            assert_eq!(read_packet(&mut reader).unwrap().as_deref(), Some(payload));
        }
        assert_eq!(read_packet(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_read_malformed() {
        for stream in [&b"12"[..], b"x\0abc\0", b"3\0abc\0", b"100\0short\0"] {
            assert!(read_packet(&mut Cursor::new(stream)).is_err());
        }
    }
}
