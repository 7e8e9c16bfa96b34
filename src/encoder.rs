//! Script text to opcode stream translation.
//!
//! A script has one instruction per line, `mnemonic[ arg1,arg2,...]`. Each instruction becomes
//! one record: the opcode byte followed by one byte per argument, written as uppercase hex and
//! closed with a newline (`servo_deg 10,20` becomes `060A14\n`). Lines with a mnemonic the
//! device does not know are dropped without error.

use crate::base::{Error, Result};
use crate::types::Opcode;
use log::{trace, warn};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What an upload sends to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UploadKind {
    /// Mnemonic script, translated to an opcode stream before sending.
    Script,
    /// Plain text, sent verbatim.
    File,
}

fn parse_argument(line: &str, arg: &str) -> Result<u8> {
    arg.trim().parse::<u8>().map_err(|_| {
        Error::malformed(format!(
            "argument {:?} in {:?} is not a byte value (0..=255)",
            arg.trim(),
            line
        ))
    })
}

/// Encodes a single script line. Returns `None` for blank lines and unknown mnemonics.
pub fn encode_line(line: &str) -> Result<Option<String>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (mnemonic, args) = match line.split_once(' ') {
        Some((mnemonic, args)) => (mnemonic, args.trim()),
        None => (line, ""),
    };

    let opcode = match Opcode::from_mnemonic(mnemonic) {
        Some(opcode) => opcode,
        None => {
            warn!("Dropping unknown mnemonic {:?}", mnemonic);
            return Ok(None);
        }
    };

    let mut record = vec![opcode.code()];
    if !args.is_empty() {
        for arg in args.split(',') {
            record.push(parse_argument(line, arg)?);
        }
    }

    let mut encoded = hex::encode_upper(record);
    encoded.push('\n');
    trace!("Encoded {:?} as {:?}", line, encoded);
    Ok(Some(encoded))
}

/// Encodes a whole script into the opcode stream the device stores.
pub fn encode_script(script: &str) -> Result<String> {
    let mut stream = String::new();
    for line in script.lines() {
        if let Some(record) = encode_line(line)? {
            stream.push_str(&record);
        }
    }
    Ok(stream)
}

/// Builds the payload for an upload of `text`.
pub fn upload_payload(kind: UploadKind, text: &str) -> Result<String> {
    match kind {
        UploadKind::Script => encode_script(text),
        UploadKind::File => Ok(text.to_owned()),
    }
}

/// Short name stored next to an upload: the file name up to its first dot.
pub fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_owned))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn servo_deg_with_two_arguments() {
        assert_eq!(
            encode_line("servo_deg 10,20").unwrap(),
            Some("060A14\n".to_owned())
        );
    }

    #[test]
    fn unknown_mnemonic_emits_nothing() {
        assert_eq!(encode_line("foo 1").unwrap(), None);
        assert_eq!(encode_script("foo 1\n").unwrap(), "");
    }

    #[test]
    fn whole_script() {
        let script = "inc_lcd 5\n\n  set_delay 255\nclear_lcd\nbogus\nservo_scan 0,180\nsleep\n";
        assert_eq!(
            encode_script(script).unwrap(),
            "0105\n04FF\n05\n0700B4\n08\n"
        );
    }

    #[test]
    fn arguments_must_fit_a_byte() {
        assert!(matches!(
            encode_line("set_delay 256"),
            Err(Error::MalformedInput { .. })
        ));
        assert!(matches!(
            encode_line("servo_deg -1"),
            Err(Error::MalformedInput { .. })
        ));
        assert!(matches!(
            encode_line("servo_deg ten"),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn file_uploads_are_verbatim() {
        assert_eq!(
            upload_payload(UploadKind::File, "hello\nworld").unwrap(),
            "hello\nworld"
        );
        assert_eq!(
            upload_payload(UploadKind::Script, "rra_lcd 3").unwrap(),
            "0303\n"
        );
    }

    #[test]
    fn names_are_file_stems() {
        assert_eq!(upload_name(Path::new("scripts/script1.txt")), "script1");
        assert_eq!(upload_name(Path::new("a.b.c")), "a");
        assert_eq!(upload_name(Path::new("plain")), "plain");
    }
}
