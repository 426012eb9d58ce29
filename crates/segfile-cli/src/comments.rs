//! # Comment area
//!
//! Read, append to, or delete the comment area of any DAF or DAS file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::kernel::KernelFile;

#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Kernel file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Append the lines of a text file to the comment area
    #[arg(long, value_name = "TEXT", conflicts_with = "delete")]
    pub add: Option<PathBuf>,

    /// Remove the comment area
    #[arg(long)]
    pub delete: bool,

    /// Fold lines longer than this many characters when reading
    #[arg(long, value_name = "N")]
    pub width: Option<usize>,
}

pub fn run(args: CommentsArgs, default_width: usize) -> Result<()> {
    if let Some(text) = &args.add {
        let added = add_from_file(&args.file, text)?;
        println!("Added {} comment lines to {}", added, args.file.display());
    } else if args.delete {
        let mut file = KernelFile::open_write(&args.file)?;
        file.comments()
            .delete_comments()
            .context("Failed to delete comments")?;
        file.close()?;
        println!("Deleted comments from {}", args.file.display());
    } else {
        for line in read(&args.file, args.width.unwrap_or(default_width))? {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Append every line of `text` to the comment area of `path`.
pub fn add_from_file(path: &Path, text: &Path) -> Result<usize> {
    let contents = fs::read_to_string(text)
        .with_context(|| format!("Failed to read {}", text.display()))?;
    let lines: Vec<&str> = contents.lines().collect();

    let mut file = KernelFile::open_write(path)?;
    file.comments()
        .add_comments(&lines)
        .with_context(|| format!("Failed to add comments to {}", path.display()))?;
    file.close()?;
    segfile_config::log_cli_info!("Added comments", lines = lines.len());
    Ok(lines.len())
}

pub fn read(path: &Path, width: usize) -> Result<Vec<String>> {
    let mut file = KernelFile::open_read(path)?;
    let lines = file.comments().read_comments(width)?;
    file.close()?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segfile_config::testing::TestEnvironment;
    use segfile_kernels::Spk;

    #[test]
    fn test_add_then_read_folds() -> Result<()> {
        let env = TestEnvironment::new()?;
        let kernel = env.kernel_path("comments.bsp");
        Spk::create(&kernel, "COMMENTS", 0)?.close()?;
        let text = env.create_file("notes.txt", b"first line\n0123456789abcdef\n")?;

        assert_eq!(add_from_file(&kernel, &text)?, 2);
        assert_eq!(read(&kernel, 255)?, vec!["first line", "0123456789abcdef"]);
        assert_eq!(
            read(&kernel, 10)?,
            vec!["first line", "0123456789", "abcdef"]
        );
        Ok(())
    }

    #[test]
    fn test_missing_text_file() -> Result<()> {
        let env = TestEnvironment::new()?;
        let kernel = env.kernel_path("empty.bsp");
        Spk::create(&kernel, "EMPTY", 0)?.close()?;

        let err = add_from_file(&kernel, &env.kernel_path("absent.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
        assert!(read(&kernel, 80)?.is_empty());
        Ok(())
    }
}
