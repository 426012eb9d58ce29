//! DAF comment area.
//!
//! Comment records sit between the file record and the first summary
//! record. Each holds 1000 characters; lines end with NUL and the area ends
//! with EOT. An area with no EOT is empty.

use segfile_config::log_daf_debug;
use segfile_record::comments::{check_comment_line, split_comment_text};
use segfile_record::{Access, CommentStore, Result, RECORD_LEN};

use crate::{Daf, COMMENT_CHARS_PER_RECORD};

const EOL: u8 = 0;
const EOT: u8 = 4;

impl Daf {
    /// Stored comment text up to (not including) the EOT marker
    fn comment_text(&self) -> Result<Vec<u8>> {
        let mut text = Vec::new();
        for number in 2..self.record.fward {
            let record = self.store.read_record(number)?;
            let chunk = &record[..COMMENT_CHARS_PER_RECORD];
            if let Some(pos) = chunk.iter().position(|b| *b == EOT) {
                text.extend_from_slice(&chunk[..pos]);
                return Ok(text);
            }
            text.extend_from_slice(chunk);
        }
        // no EOT: nothing was ever written
        Ok(Vec::new())
    }

    fn write_comment_text(&mut self, text: &[u8]) -> Result<()> {
        for (i, chunk) in text.chunks(COMMENT_CHARS_PER_RECORD).enumerate() {
            let mut record = [0u8; RECORD_LEN];
            record[..chunk.len()].copy_from_slice(chunk);
            self.store.write_record(2 + i as u32, &record)?;
        }
        Ok(())
    }
}

impl CommentStore for Daf {
    fn add_comments(&mut self, lines: &[&str]) -> Result<()> {
        self.check_access(Access::Write)?;
        for line in lines {
            check_comment_line(line)?;
        }
        if lines.is_empty() {
            return Ok(());
        }

        let mut text = self.comment_text()?;
        for line in lines {
            text.extend_from_slice(line.as_bytes());
            text.push(EOL);
        }
        text.push(EOT);

        let needed = text.len().div_ceil(COMMENT_CHARS_PER_RECORD) as u32;
        let reserved = self.record.reserved_records();
        if needed > reserved {
            self.shift_directory((needed - reserved) as i32)?;
        }
        self.write_comment_text(&text)?;
        log_daf_debug!("Added comments", lines = lines.len(), records = needed);
        Ok(())
    }

    fn read_comments(&self, max_line_len: usize) -> Result<Vec<String>> {
        self.check_access(Access::Read)?;
        let text = self.comment_text()?;
        split_comment_text(&text, EOL, max_line_len)
    }

    fn delete_comments(&mut self) -> Result<()> {
        self.check_access(Access::Write)?;
        let reserved = self.record.reserved_records();
        if reserved > 0 {
            self.shift_directory(-(reserved as i32))?;
            log_daf_debug!("Deleted comment area", records = reserved);
        }
        Ok(())
    }
}
