//! DAS comment area: whole records of 1024 characters after the reserved
//! records. Lines end with NUL; the file record's character count marks the
//! end of the text.

use segfile_config::log_das_debug;
use segfile_record::comments::{check_comment_line, split_comment_text};
use segfile_record::{Access, CommentStore, Result, RECORD_LEN};

use crate::Das;

const EOL: u8 = 0;

impl Das {
    fn comment_text(&self) -> Result<Vec<u8>> {
        let total = self.record.comment_chars as usize;
        let mut text = Vec::with_capacity(total);
        let first = self.record.first_comment_record();
        for number in first..first + self.record.comment_records {
            if text.len() >= total {
                break;
            }
            let record = self.store.read_record(number)?;
            let n = (total - text.len()).min(RECORD_LEN);
            text.extend_from_slice(&record[..n]);
        }
        Ok(text)
    }
}

impl CommentStore for Das {
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

        let needed = text.len().div_ceil(RECORD_LEN) as u32;
        let current = self.record.comment_records;
        if needed > current {
            self.shift_directories((needed - current) as i32)?;
            self.record.comment_records = needed;
        }

        let first = self.record.first_comment_record();
        for (i, chunk) in text.chunks(RECORD_LEN).enumerate() {
            let mut record = [0u8; RECORD_LEN];
            record[..chunk.len()].copy_from_slice(chunk);
            self.store.write_record(first + i as u32, &record)?;
        }
        self.record.comment_chars = text.len() as u32;
        self.write_file_record()?;
        log_das_debug!("Added comments", lines = lines.len(), records = needed);
        Ok(())
    }

    fn read_comments(&self, max_line_len: usize) -> Result<Vec<String>> {
        self.check_access(Access::Read)?;
        let text = self.comment_text()?;
        split_comment_text(&text, EOL, max_line_len)
    }

    fn delete_comments(&mut self) -> Result<()> {
        self.check_access(Access::Write)?;
        let records = self.record.comment_records;
        if records > 0 {
            self.shift_directories(-(records as i32))?;
        }
        self.record.comment_records = 0;
        self.record.comment_chars = 0;
        self.write_file_record()?;
        log_das_debug!("Deleted comment area", records = records);
        Ok(())
    }
}
