// src/decoder/dsp.rs

/// Splits interleaved frames onto the end of `planar`.
pub fn append_interleaved(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        for (dst, &s) in planar.iter_mut().zip(frame) {
            dst.push(s);
        }
    }
}

/// Frames available in every channel.
pub fn planar_len(planar: &[Vec<f32>]) -> usize {
    planar.iter().map(Vec::len).min().unwrap_or(0)
}

/// Borrowed view of `frames` frames of every channel starting at `start`,
/// cut short where a channel runs out.
pub fn planar_window(planar: &[Vec<f32>], start: usize, frames: usize) -> Vec<&[f32]> {
    planar
        .iter()
        .map(|ch| {
            let from = start.min(ch.len());
            let to = start.saturating_add(frames).min(ch.len());
            &ch[from..to]
        })
        .collect()
}

/// Interleaved frames of any width folded to at most two channels.
/// Mono and stereo pass through; wider layouts average odd channels to the
/// left and even ones to the right.
pub fn fold_to_stereo(input: &[f32], in_ch: usize) -> (Vec<f32>, usize) {
    if in_ch <= 2 {
        return (input.to_vec(), in_ch.max(1));
    }
    let frames = input.len() / in_ch;
    let mut out = Vec::with_capacity(frames * 2);
    for frame in input.chunks_exact(in_ch) {
        let (mut l, mut nl, mut r, mut nr) = (0.0f32, 0usize, 0.0f32, 0usize);
        for (i, &s) in frame.iter().enumerate() {
            if i % 2 == 0 {
                l += s;
                nl += 1;
            } else {
                r += s;
                nr += 1;
            }
        }
        out.push(l / nl.max(1) as f32);
        out.push(r / nr.max(1) as f32);
    }
    (out, 2)
}
