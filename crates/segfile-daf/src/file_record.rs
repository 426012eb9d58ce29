//! The DAF file record (record 1).
//!
//! ```text
//! bytes   0..8     id word        "DAF/SPK " etc.
//! bytes   8..12    ND             doubles per summary
//! bytes  12..16    NI             integers per summary
//! bytes  16..76    internal file name
//! bytes  76..80    FWARD          first summary record
//! bytes  80..84    BWARD          last summary record
//! bytes  84..88    FREE           first free data address
//! bytes  88..96    binary format  "LTL-IEEE" / "BIG-IEEE"
//! bytes 699..727   FTP validation string
//! ```

use segfile_record::format::{
    self, check_ftp, read_text, write_text, FORMAT_WORD_LEN, FTP_OFFSET, FTP_STRING, ID_WORD_LEN,
};
use segfile_record::{ByteOrder, ErrorKind, FileType, KernelError, Record, Result, RECORD_LEN};

/// Length of the internal file name field
pub const INTERNAL_NAME_LEN: usize = 60;

const ND_OFFSET: usize = 8;
const NI_OFFSET: usize = 12;
const NAME_OFFSET: usize = 16;
const FWARD_OFFSET: usize = 76;
const BWARD_OFFSET: usize = 80;
const FREE_OFFSET: usize = 84;
const FORMAT_OFFSET: usize = 88;

/// Largest summary, in double precision words
pub const MAX_SUMMARY_SIZE: usize = 125;

/// Decoded file record
#[derive(Debug, Clone, PartialEq)]
pub struct DafFileRecord {
    pub file_type: FileType,
    pub nd: usize,
    pub ni: usize,
    pub internal_name: String,
    /// First summary record
    pub fward: u32,
    /// Last summary record
    pub bward: u32,
    /// First free double precision address
    pub free: u32,
    pub byte_order: ByteOrder,
}

impl DafFileRecord {
    /// Number of comment records between the file record and the directory
    pub fn reserved_records(&self) -> u32 {
        self.fward.saturating_sub(2)
    }

    pub fn decode(record: &Record) -> Result<Self> {
        let byte_order =
            ByteOrder::from_format_word(&read_text(&record[FORMAT_OFFSET..FORMAT_OFFSET + FORMAT_WORD_LEN]))?;
        check_ftp(record)?;

        let file_type = FileType::parse_id_word(&read_text(&record[..ID_WORD_LEN]))?;
        let int_at = |offset: usize| byte_order.get_i32(&mut &record[offset..offset + 4]);
        let nd = int_at(ND_OFFSET);
        let ni = int_at(NI_OFFSET);
        let fward = int_at(FWARD_OFFSET);
        let bward = int_at(BWARD_OFFSET);
        let free = int_at(FREE_OFFSET);

        if nd < 0 || ni < 0 {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("negative summary dimensions ND={} NI={}", nd, ni),
            ));
        }
        check_dimensions(nd as usize, ni as usize).map_err(|e| {
            KernelError::new(ErrorKind::InvalidFormat, format!("corrupt file record: {}", e))
        })?;
        if fward < 2 || bward < fward || free < 1 {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!(
                    "corrupt directory pointers FWARD={} BWARD={} FREE={}",
                    fward, bward, free
                ),
            ));
        }

        Ok(Self {
            file_type,
            nd: nd as usize,
            ni: ni as usize,
            internal_name: read_text(&record[NAME_OFFSET..NAME_OFFSET + INTERNAL_NAME_LEN]),
            fward: fward as u32,
            bward: bward as u32,
            free: free as u32,
            byte_order,
        })
    }

    pub fn encode(&self) -> Record {
        let mut record = [0u8; RECORD_LEN];
        write_text(&mut record[..ID_WORD_LEN], &self.file_type.id_word());
        let order = self.byte_order;
        let mut put_int = |offset: usize, value: i32| {
            order.put_i32(&mut &mut record[offset..offset + 4], value);
        };
        put_int(ND_OFFSET, self.nd as i32);
        put_int(NI_OFFSET, self.ni as i32);
        put_int(FWARD_OFFSET, self.fward as i32);
        put_int(BWARD_OFFSET, self.bward as i32);
        put_int(FREE_OFFSET, self.free as i32);
        write_text(
            &mut record[NAME_OFFSET..NAME_OFFSET + INTERNAL_NAME_LEN],
            &self.internal_name,
        );
        write_text(
            &mut record[FORMAT_OFFSET..FORMAT_OFFSET + FORMAT_WORD_LEN],
            order.format_word(),
        );
        record[FTP_OFFSET..FTP_OFFSET + FTP_STRING.len()].copy_from_slice(FTP_STRING);
        record
    }
}

/// Validate summary dimensions: `ND` in 0..=124, `NI` in 2..=250 and the
/// packed summary no larger than 125 doubles.
pub fn check_dimensions(nd: usize, ni: usize) -> Result<()> {
    if nd > 124 || !(2..=250).contains(&ni) || nd + ni.div_ceil(2) > MAX_SUMMARY_SIZE {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!(
                "summary dimensions ND={} NI={} are outside the supported range",
                nd, ni
            ),
        ));
    }
    Ok(())
}

/// Validate an internal file name: printable and at most 60 characters.
pub fn check_internal_name(name: &str) -> Result<()> {
    format::check_printable("internal file name", name)?;
    if name.len() > INTERNAL_NAME_LEN {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!(
                "internal file name is {} characters; at most {} are allowed",
                name.len(),
                INTERNAL_NAME_LEN
            ),
        ));
    }
    Ok(())
}
