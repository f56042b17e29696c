//! ZIP packaging of per-year files.

use std::io::{Cursor, Write as _};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::Result;

/// Deflate each `(name, bytes)` entry into one in-memory archive.
pub fn zip_entries<'a, I>(entries: I) -> Result<Vec<u8>>
where
  I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
  let mut buf = Vec::new();
  {
    let mut zip = ZipWriter::new(Cursor::new(&mut buf));
    let options =
      SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
      zip.start_file(name, options)?;
      zip.write_all(bytes)?;
    }
    zip.finish()?;
  }
  Ok(buf)
}

#[cfg(test)]
mod tests {
  use std::io::Read as _;

  use zip::ZipArchive;

  use super::*;

  #[test]
  fn one_entry_per_file() {
    let bytes = zip_entries([
      ("a_2022.csv", b"x,y\n1,2\n".as_slice()),
      ("a_2023.csv", b"x,y\n3,4\n".as_slice()),
    ])
    .unwrap();

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);
    let mut body = String::new();
    archive.by_name("a_2023.csv").unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "x,y\n3,4\n");
    assert_eq!(
      archive.by_index(0).unwrap().compression(),
      CompressionMethod::Deflated
    );
  }
}
