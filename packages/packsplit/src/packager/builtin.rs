//! In-process packaging.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use super::{PackReport, PackRequest, Packager};
use crate::config::BYTES_PER_TOKEN;
use crate::error::Result;
use crate::tree::walk_included;

/// Deterministic packager that needs no external tool.
///
/// Concatenates every included file, in sorted path order, into an XML-style
/// artifact and reports `artifact bytes / 4` tokens. The encoding is recorded
/// in the artifact header but does not affect the count.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPackager;

impl Packager for BuiltinPackager {
    fn pack(&self, request: &PackRequest<'_>) -> Result<PackReport> {
        let matcher = request.ignore.matcher()?;
        let files = walk_included(request.workdir, &matcher)?;

        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(request.output)?);
        writeln!(out, "<packed encoding=\"{}\">", request.encoding)?;
        for file in &files {
            let bytes = fs::read(request.workdir.join(&file.rel_path))?;
            writeln!(
                out,
                "<file path=\"{}\">",
                file.rel_path.to_string_lossy().replace('\\', "/")
            )?;
            out.write_all(String::from_utf8_lossy(&bytes).as_bytes())?;
            writeln!(out, "\n</file>")?;
        }
        writeln!(out, "</packed>")?;
        out.flush()?;
        drop(out);

        let size = fs::metadata(request.output)?.len();
        tracing::debug!(
            files = files.len(),
            bytes = size,
            output = %request.output.display(),
            "builtin packager wrote artifact"
        );
        Ok(PackReport {
            total_tokens: Some(size / BYTES_PER_TOKEN),
        })
    }
}
