//! The DAS file record (record 1).
//!
//! ```text
//! bytes   0..8     id word        "DAS/DSK " etc.
//! bytes   8..68    internal file name
//! bytes  68..72    NRESVR         reserved records
//! bytes  72..76    NRESVC         characters in use in reserved records
//! bytes  76..80    NCOMR          comment records
//! bytes  80..84    NCOMC          characters in use in comment records
//! bytes  84..92    binary format  "LTL-IEEE" / "BIG-IEEE"
//! bytes 699..727   FTP validation string
//! ```

use serde::Serialize;

use segfile_record::format::{
    check_ftp, read_text, write_text, FORMAT_WORD_LEN, FTP_OFFSET, FTP_STRING, ID_WORD_LEN,
};
use segfile_record::{ByteOrder, ErrorKind, FileType, KernelError, Record, Result, RECORD_LEN};

/// Length of the internal file name field
pub const INTERNAL_NAME_LEN: usize = 60;

const NAME_OFFSET: usize = 8;
const NRESVR_OFFSET: usize = 68;
const NRESVC_OFFSET: usize = 72;
const NCOMR_OFFSET: usize = 76;
const NCOMC_OFFSET: usize = 80;
const FORMAT_OFFSET: usize = 84;

/// Decoded file record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DasFileRecord {
    #[serde(serialize_with = "serialize_file_type")]
    pub file_type: FileType,
    pub internal_name: String,
    pub reserved_records: u32,
    pub reserved_chars: u32,
    pub comment_records: u32,
    pub comment_chars: u32,
    #[serde(skip)]
    pub byte_order: ByteOrder,
}

fn serialize_file_type<S: serde::Serializer>(
    file_type: &FileType,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(file_type)
}

impl DasFileRecord {
    /// Record number of the first cluster directory record
    pub fn first_directory(&self) -> u32 {
        2 + self.reserved_records + self.comment_records
    }

    /// First comment record
    pub fn first_comment_record(&self) -> u32 {
        2 + self.reserved_records
    }

    pub fn decode(record: &Record) -> Result<Self> {
        let byte_order = ByteOrder::from_format_word(&read_text(
            &record[FORMAT_OFFSET..FORMAT_OFFSET + FORMAT_WORD_LEN],
        ))?;
        check_ftp(record)?;
        let file_type = FileType::parse_id_word(&read_text(&record[..ID_WORD_LEN]))?;

        let count = |offset: usize, what: &str| -> Result<u32> {
            let value = byte_order.get_i32(&mut &record[offset..offset + 4]);
            u32::try_from(value).map_err(|_| {
                KernelError::new(
                    ErrorKind::InvalidFormat,
                    format!("negative {} count {} in file record", what, value),
                )
            })
        };

        Ok(Self {
            file_type,
            internal_name: read_text(&record[NAME_OFFSET..NAME_OFFSET + INTERNAL_NAME_LEN]),
            reserved_records: count(NRESVR_OFFSET, "reserved record")?,
            reserved_chars: count(NRESVC_OFFSET, "reserved character")?,
            comment_records: count(NCOMR_OFFSET, "comment record")?,
            comment_chars: count(NCOMC_OFFSET, "comment character")?,
            byte_order,
        })
    }

    pub fn encode(&self) -> Record {
        let mut record = [0u8; RECORD_LEN];
        write_text(&mut record[..ID_WORD_LEN], &self.file_type.id_word());
        write_text(
            &mut record[NAME_OFFSET..NAME_OFFSET + INTERNAL_NAME_LEN],
            &self.internal_name,
        );
        let order = self.byte_order;
        for (offset, value) in [
            (NRESVR_OFFSET, self.reserved_records),
            (NRESVC_OFFSET, self.reserved_chars),
            (NCOMR_OFFSET, self.comment_records),
            (NCOMC_OFFSET, self.comment_chars),
        ] {
            order.put_i32(&mut &mut record[offset..offset + 4], value as i32);
        }
        write_text(
            &mut record[FORMAT_OFFSET..FORMAT_OFFSET + FORMAT_WORD_LEN],
            order.format_word(),
        );
        record[FTP_OFFSET..FTP_OFFSET + FTP_STRING.len()].copy_from_slice(FTP_STRING);
        record
    }
}
