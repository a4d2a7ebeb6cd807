use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::ArchiveError;

/// Zip the contents of `src` into `dest`, returning the archive size.
///
/// Entries are written in file-name order with a fixed timestamp, so the
/// same tree always yields the same bytes.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<u64, ArchiveError> {
    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let file_opts = base.unix_permissions(0o644);
    let dir_opts = base.unix_permissions(0o755);

    for entry in WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, dir_opts)?;
        } else if entry.file_type().is_file() {
            let len = entry.metadata()?.len();
            zip.start_file(name, file_opts.large_file(needs_zip64(len)))?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut zip)?;
        }
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    drop(writer);
    Ok(fs::metadata(dest)?.len())
}

/// Entries at or past 4 GiB need zip64 headers; big pack files get there.
fn needs_zip64(len: u64) -> bool {
    len >= u64::from(u32::MAX)
}
