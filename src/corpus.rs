use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, IoContext, Result};

/// One corpus record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// 1-based line number in the corpus file.
    pub line: usize,
    /// Length of the raw line in bytes, newline included.
    pub bytes: usize,
    /// One text per configured key, in key order.
    pub texts: Vec<String>,
}

/// Streams json-lines records, yielding the configured text fields of each.
pub struct CorpusReader<R> {
    reader: R,
    path: PathBuf,
    keys: Vec<String>,
    line: usize,
    buf: String,
}

impl CorpusReader<BufReader<File>> {
    pub fn open(path: &Path, keys: &[String]) -> Result<Self> {
        let file = File::open(path).with_path(path)?;
        Ok(Self::new(BufReader::new(file), path, keys))
    }
}

impl<R: BufRead> CorpusReader<R> {
    pub fn new(reader: R, path: impl Into<PathBuf>, keys: &[String]) -> Self {
        Self {
            reader,
            path: path.into(),
            keys: keys.to_vec(),
            line: 0,
            buf: String::new(),
        }
    }

    fn parse(&self, raw: &str) -> Result<Document> {
        let value: Value = serde_json::from_str(raw).map_err(|source| Error::Json {
            path: self.path.clone(),
            line: self.line,
            source,
        })?;
        let record = value.as_object().ok_or_else(|| Error::NotAnObject {
            path: self.path.clone(),
            line: self.line,
        })?;

        let texts = self
            .keys
            .iter()
            .map(|key| {
                let value = record.get(key).ok_or_else(|| Error::MissingKey {
                    path: self.path.clone(),
                    line: self.line,
                    key: key.clone(),
                })?;
                value.as_str().map(str::to_owned).ok_or_else(|| Error::NotAString {
                    path: self.path.clone(),
                    line: self.line,
                    key: key.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Document {
            line: self.line,
            bytes: raw.len(),
            texts,
        })
    }
}

impl<R: BufRead> Iterator for CorpusReader<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    if self.buf.trim().is_empty() {
                        continue;
                    }
                    return Some(self.parse(&self.buf));
                }
                Err(source) => {
                    // The unreadable line is consumed; later lines keep their numbers.
                    self.line += 1;
                    return Some(Err(Error::Read {
                        path: self.path.clone(),
                        line: self.line,
                        source,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(input: &str, keys: &[&str]) -> CorpusReader<Cursor<Vec<u8>>> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        CorpusReader::new(Cursor::new(input.as_bytes().to_vec()), "corpus.json", &keys)
    }

    #[test]
    fn reads_configured_keys_in_order() {
        let input = "{\"text\": \"hello\", \"title\": \"greeting\", \"id\": 3}\n\
                     {\"title\": \"t2\", \"text\": \"second\"}\n";
        let docs: Vec<Document> = reader(input, &["title", "text"])
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].texts, vec!["greeting", "hello"]);
        assert_eq!(docs[0].line, 1);
        assert_eq!(
            docs[0].bytes,
            "{\"text\": \"hello\", \"title\": \"greeting\", \"id\": 3}\n".len()
        );
        assert_eq!(docs[1].texts, vec!["t2", "second"]);
        assert_eq!(docs[1].line, 2);
    }

    #[test]
    fn skips_blank_lines_but_counts_them() {
        let input = "\n{\"text\": \"a\"}\n   \n{\"text\": \"b\"}";
        let docs: Vec<Document> = reader(input, &["text"]).collect::<Result<_>>().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].line, 2);
        assert_eq!(docs[1].line, 4);
        assert_eq!(docs[1].texts, vec!["b"]);
        assert_eq!(docs[1].bytes, "{\"text\": \"b\"}".len());
    }

    #[test]
    fn keeps_unicode_and_escapes() {
        let input = "{\"text\": \"caf\\u00e9\\nna\u{ef}ve\"}\n";
        let doc = reader(input, &["text"]).next().unwrap().unwrap();
        assert_eq!(doc.texts, vec!["café\nnaïve"]);
    }

    #[test]
    fn invalid_json_reports_line() {
        let input = "{\"text\": \"ok\"}\n{\"text\": \n";
        let mut r = reader(input, &["text"]);
        assert!(r.next().unwrap().is_ok());
        match r.next().unwrap() {
            Err(Error::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_reports_line() {
        let input = b"{\"text\": \"a\"}\n{\"text\": \"\xff\"}\n{\"text\": \"c\"}\n".to_vec();
        let mut r = CorpusReader::new(Cursor::new(input), "corpus.json", &["text".into()]);
        assert!(r.next().unwrap().is_ok());
        match r.next().unwrap() {
            Err(err @ Error::Read { line: 2, .. }) => {
                assert!(err.to_string().starts_with("corpus.json:2:"))
            }
            other => panic!("unexpected {other:?}"),
        }
        let doc = r.next().unwrap().unwrap();
        assert_eq!((doc.line, doc.texts), (3, vec!["c".to_string()]));
    }

    #[test]
    fn non_object_record_is_rejected() {
        let mut r = reader("[1, 2]\n", &["text"]);
        assert!(matches!(
            r.next(),
            Some(Err(Error::NotAnObject { line: 1, .. }))
        ));
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut r = reader("{\"body\": \"x\"}\n", &["text"]);
        match r.next().unwrap() {
            Err(Error::MissingKey { key, line, .. }) => {
                assert_eq!(key, "text");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_string_value_is_rejected() {
        let mut r = reader("{\"text\": 42}\n", &["text"]);
        assert!(matches!(r.next(), Some(Err(Error::NotAString { .. }))));
    }

    #[test]
    fn open_missing_file_names_the_path() {
        let err = CorpusReader::open(Path::new("/nonexistent/corpus.json"), &["text".into()])
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/corpus.json"));
    }
}
