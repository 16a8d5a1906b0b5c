use sha2::{Digest, Sha256};
use std::path::Path;
use svcgraph_core::model::CodeChunk;

/// Stable chunk id within one run.
pub fn chunk_id(run_id: &str, service: &str, path: &Path, start_byte: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update([0]);
    hasher.update(service.as_bytes());
    hasher.update([0]);
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update([0]);
    hasher.update(start_byte.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Splits one file into chunks of at most `max_bytes`, cutting on line
/// boundaries. A single line longer than `max_bytes` is cut on char
/// boundaries.
pub fn chunk_file(
    run_id: &str,
    service: &str,
    path: &Path,
    text: &str,
    max_bytes: usize,
) -> Vec<CodeChunk> {
    let max_bytes = max_bytes.max(1);
    let mut chunks = Vec::new();

    let mut start_byte = 0;
    let mut start_line = 1;
    let mut end_byte = 0;
    let mut line_no = 0;

    let mut flush = |from: usize, to: usize, first: usize, last: usize| {
        let body = &text[from..to];
        if body.trim().is_empty() {
            return;
        }
        chunks.push(CodeChunk {
            id: chunk_id(run_id, service, path, from),
            service: service.to_string(),
            path: path.to_path_buf(),
            start_line: first,
            end_line: last,
            start_byte: from,
            end_byte: to,
            text: body.to_string(),
        });
    };

    for line in text.split_inclusive('\n') {
        line_no += 1;
        let line_start = end_byte;
        let line_end = line_start + line.len();

        if line.len() > max_bytes {
            if end_byte > start_byte {
                flush(start_byte, end_byte, start_line, line_no - 1);
            }
            let mut from = line_start;
            while from < line_end {
                let mut to = (from + max_bytes).min(line_end);
                while !text.is_char_boundary(to) {
                    to -= 1;
                }
                if to == from {
                    to = next_char_boundary(text, from);
                }
                flush(from, to, line_no, line_no);
                from = to;
            }
            start_byte = line_end;
            start_line = line_no + 1;
        } else if line_end - start_byte > max_bytes {
            flush(start_byte, end_byte, start_line, line_no - 1);
            start_byte = line_start;
            start_line = line_no;
        }
        end_byte = line_end;
    }
    if end_byte > start_byte {
        flush(start_byte, end_byte, start_line, line_no);
    }

    chunks
}

fn next_char_boundary(text: &str, from: usize) -> usize {
    (from + 1..=text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len())
}
