//! 16-bit PCM sample alignment for streamed audio.
//!
//! The synthesis vendor streams raw little-endian 16-bit PCM in arbitrary
//! byte chunks. Every chunk forwarded to the client must land on a 2-byte
//! sample boundary or playback produces a pop, so at most one byte is held
//! back between reads and a trailing odd byte is dropped at end of stream
//! rather than emitted as a truncated sample.

/// Re-frames an incoming byte stream onto sample boundaries.
#[derive(Debug, Default)]
pub struct SampleAligner {
    leftover: Option<u8>,
}

impl SampleAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk; returns the even-length bytes ready to emit, if any.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        let mut data = Vec::with_capacity(chunk.len() + 1);
        if let Some(byte) = self.leftover.take() {
            data.push(byte);
        }
        data.extend_from_slice(chunk);

        if data.len() % 2 != 0 {
            self.leftover = data.pop();
        }

        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }

    /// Bytes currently held back waiting for their other half (0 or 1).
    pub fn pending(&self) -> usize {
        usize::from(self.leftover.is_some())
    }

    /// End of stream: returns the dropped odd byte, if one was held.
    pub fn finish(mut self) -> Option<u8> {
        self.leftover.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&[u8]]) -> (Vec<Vec<u8>>, Option<u8>) {
        let mut aligner = SampleAligner::new();
        let mut out = Vec::new();
        for chunk in chunks {
            if let Some(data) = aligner.push(chunk) {
                out.push(data);
            }
        }
        let dropped = aligner.finish();
        (out, dropped)
    }

    #[test]
    fn even_chunks_pass_through_unchanged() {
        let (out, dropped) = run(&[&[1, 2, 3, 4], &[5, 6]]);
        assert_eq!(out, vec![vec![1, 2, 3, 4], vec![5, 6]]);
        assert_eq!(dropped, None);
    }

    #[test]
    fn odd_chunk_holds_back_its_last_byte() {
        let mut aligner = SampleAligner::new();
        assert_eq!(aligner.push(&[1, 2, 3]), Some(vec![1, 2]));
        assert_eq!(aligner.pending(), 1);
        // The held byte leads the next chunk.
        assert_eq!(aligner.push(&[4, 5]), Some(vec![3, 4]));
        assert_eq!(aligner.pending(), 1);
    }

    #[test]
    fn single_byte_chunks_pair_up() {
        let (out, dropped) = run(&[&[1], &[2], &[3], &[4]]);
        assert_eq!(out, vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(dropped, None);
    }

    #[test]
    fn trailing_odd_byte_is_dropped_not_emitted() {
        let (out, dropped) = run(&[&[1, 2], &[3]]);
        assert_eq!(out, vec![vec![1, 2]]);
        assert_eq!(dropped, Some(3));
    }

    #[test]
    fn empty_chunks_emit_nothing() {
        let mut aligner = SampleAligner::new();
        assert_eq!(aligner.push(&[]), None);
        assert_eq!(aligner.push(&[7]), None);
        // Empty push while a byte is held keeps holding it.
        assert_eq!(aligner.push(&[]), None);
        assert_eq!(aligner.pending(), 1);
        assert_eq!(aligner.finish(), Some(7));
    }

    #[test]
    fn every_output_is_even_and_totals_match_within_one_byte() {
        let chunks: Vec<Vec<u8>> = vec![
            vec![0; 3],
            vec![1; 8],
            vec![2; 1],
            vec![3; 7],
            vec![4; 2],
        ];
        let refs: Vec<&[u8]> = chunks.iter().map(|c| c.as_slice()).collect();
        let (out, dropped) = run(&refs);

        let total_in: usize = chunks.iter().map(|c| c.len()).sum();
        let total_out: usize = out.iter().map(|c| c.len()).sum();
        for emitted in &out {
            assert_eq!(emitted.len() % 2, 0);
        }
        assert_eq!(total_in - total_out, usize::from(dropped.is_some()));
    }
}
