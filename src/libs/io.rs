use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Opens `input` for reading. `stdin` reads the standard input, files ending
/// in `.gz` are decompressed on the fly.
///
/// ```
/// use std::io::BufRead;
/// let reader = alnkit::reader("tests/aln/taxa.txt").unwrap();
/// assert_eq!(reader.lines().count(), 2);
/// ```
pub fn reader(input: &str) -> std::io::Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = Path::new(input);
        let file = std::fs::File::open(path).map_err(|why| {
            std::io::Error::new(
                why.kind(),
                format!("could not open {}: {}", path.display(), why),
            )
        })?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

/// Reads every line of a (possibly gzipped) text file
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let reader = reader(&path.to_string_lossy())?;
    reader.lines().collect()
}

/// First whitespace-delimited column of every non-empty, non-comment line
pub fn read_first_column(input: &str) -> std::io::Result<Vec<String>> {
    let reader = reader(input)?;
    let mut list = vec![];
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(field) = line.split(|c: char| c.is_whitespace() || c == ',').next() {
            if !field.is_empty() {
                list.push(field.to_string());
            }
        }
    }
    Ok(list)
}

/// `stdout` or a plain file, without the atomic guarantee of [`AtomicFile`]
pub fn writer(output: &str) -> std::io::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        Box::new(BufWriter::new(std::fs::File::create(output)?))
    };

    Ok(writer)
}

/// A file written next to its destination and renamed into place on
/// [`AtomicFile::commit`]. Dropping it without committing removes the
/// temporary file, so a failed render never leaves a truncated output.
pub struct AtomicFile {
    inner: BufWriter<tempfile::NamedTempFile>,
    dest: PathBuf,
}

impl AtomicFile {
    pub fn create(dest: &Path) -> std::io::Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(".alnkit-")
            .tempfile_in(dir)?;

        Ok(Self {
            inner: BufWriter::new(tmp),
            dest: dest.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dest
    }

    pub fn commit(self) -> std::io::Result<PathBuf> {
        let tmp = self.inner.into_inner().map_err(|e| e.into_error())?;
        tmp.persist(&self.dest).map_err(|e| e.error)?;
        log::debug!("wrote {}", self.dest.display());

        Ok(self.dest)
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
