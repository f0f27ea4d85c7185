//! ASS subtitle rendering.
//!
//! Two renderers share one script layout (1920x1080 play resolution):
//! - sentence captions from SRT cues with a single `Default` style
//! - word-highlight captions from timed words, drawn as a `Base` layer with
//!   the whole dialogue plus one `Highlight` event per spoken word

use serde::Deserialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;
use vforge_models::{HighlightStyle, RgbColor, SegmentsStyle};

use crate::error::{MediaError, MediaResult};

/// Longest a highlight line may span before it is broken, in seconds.
pub const MAX_LINE_DURATION: f64 = 5.0;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

const TRANSPARENT_BLACK: &str = "&H00000000&";

/// One SRT cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A word with its spoken interval.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Word-timing document: `{"words": [{"word", "start", "end"}, ...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WordsDocument {
    #[serde(default)]
    pub words: Vec<TimedWord>,
}

/// Consecutive words shown together, split into lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialogue {
    pub start: f64,
    pub end: f64,
    pub lines: Vec<Vec<TimedWord>>,
}

/// `&H00BBGGRR&`
pub fn ass_color(color: RgbColor) -> String {
    format!("&H00{:02X}{:02X}{:02X}&", color.b, color.g, color.r)
}

/// `&HAABBGGRR&` where alpha is inverted opacity (00 = opaque).
pub fn ass_back_color(color: RgbColor, opacity: u8) -> String {
    format!(
        "&H{:02X}{:02X}{:02X}{:02X}&",
        255 - opacity,
        color.b,
        color.g,
        color.r
    )
}

/// `H:MM:SS.cc`
pub fn format_ass_time(seconds: f64) -> String {
    let total_centis = (seconds.max(0.0) * 100.0).round() as u64;
    let whole = total_centis / 100;
    let centis = total_centis % 100;
    format!(
        "{}:{:02}:{:02}.{:02}",
        whole / 3600,
        (whole % 3600) / 60,
        whole % 60,
        centis
    )
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is accepted too).
pub fn parse_srt_time(value: &str) -> MediaResult<f64> {
    let invalid = || MediaError::invalid_subtitle(format!("bad SRT timestamp: {}", value.trim()));

    let mut parts = value.trim().splitn(3, ':');
    let (h, m, rest) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(rest)) => (h, m, rest),
        _ => return Err(invalid()),
    };
    let (s, ms) = rest.split_once([',', '.']).ok_or_else(invalid)?;

    let field = |v: &str| v.trim().parse::<u64>().map_err(|_| invalid());
    Ok(field(h)? as f64 * 3600.0 + field(m)? as f64 * 60.0 + field(s)? as f64 + field(ms)? as f64 / 1000.0)
}

/// Parse SRT content into cues. Blocks without a timing line or text are skipped.
pub fn parse_srt(content: &str) -> MediaResult<Vec<SrtCue>> {
    let normalized = content.replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in normalized.trim().split("\n\n") {
        let lines: Vec<&str> = block.trim().lines().collect();
        let Some(timing_at) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let text = lines[timing_at + 1..].join("\n");
        if text.trim().is_empty() {
            continue;
        }

        let (start, end) = lines[timing_at]
            .split_once("-->")
            .ok_or_else(|| MediaError::invalid_subtitle("missing SRT arrow"))?;

        cues.push(SrtCue {
            start: parse_srt_time(start)?,
            end: parse_srt_time(end)?,
            text,
        });
    }

    if cues.is_empty() {
        return Err(MediaError::invalid_subtitle("no cues found in SRT input"));
    }
    Ok(cues)
}

fn script_header(title: &str) -> String {
    [
        "[Script Info]",
        format!("Title: {}", title).as_str(),
        "ScriptType: v4.00+",
        "WrapStyle: 0",
        "PlayResX: 1920",
        "PlayResY: 1080",
        "ScaledBorderAndShadow: yes",
        "",
        "[V4+ Styles]",
        STYLE_FORMAT,
    ]
    .join("\n")
}

/// Render sentence captions with one style for every cue.
pub fn render_segments_ass(cues: &[SrtCue], style: &SegmentsStyle) -> String {
    let primary = ass_color(style.colors.primary);
    let outline = ass_color(style.colors.outline);

    let mut out = script_header("Generated Subtitles");
    let _ = write!(
        out,
        "\nStyle: Default,{},{},{},{},{},{},{},0,0,0,100,100,0,0,{},{},0,{},10,10,{},1\n\n",
        style.font.name,
        style.font.size,
        primary,
        primary,
        outline,
        TRANSPARENT_BLACK,
        if style.font.bold { "-1" } else { "0" },
        style.border.style,
        style.border.width,
        style.position.alignment,
        style.position.margin_vertical,
    );
    out.push_str("[Events]\n");
    out.push_str(EVENT_FORMAT);

    for cue in cues {
        let _ = write!(
            out,
            "\nDialogue: 0,{},{},Default,,0,0,0,,{}",
            format_ass_time(cue.start),
            format_ass_time(cue.end),
            cue.text.replace('\n', "\\N")
        );
    }

    out
}

/// Group words into dialogues of at most `max_lines` lines.
///
/// A line breaks after `words_per_line` words or once it spans
/// [`MAX_LINE_DURATION`]; a dialogue closes when it holds `max_lines` lines.
pub fn group_words(words: &[TimedWord], words_per_line: usize, max_lines: usize) -> Vec<Dialogue> {
    let words_per_line = words_per_line.max(1);
    let max_lines = max_lines.max(1);

    let mut dialogues = Vec::new();
    let mut lines: Vec<Vec<TimedWord>> = Vec::new();
    let mut line: Vec<TimedWord> = Vec::new();
    let mut dialogue_start: Option<f64> = None;
    let mut line_start = 0.0;

    for word in words {
        let word = TimedWord {
            word: word.word.trim().to_string(),
            ..word.clone()
        };

        if line.is_empty() {
            line_start = word.start;
        }
        let start = *dialogue_start.get_or_insert(word.start);
        let word_end = word.end;
        line.push(word);

        if line.len() >= words_per_line || word_end - line_start >= MAX_LINE_DURATION {
            lines.push(std::mem::take(&mut line));

            if lines.len() >= max_lines {
                dialogues.push(Dialogue {
                    start,
                    end: word_end,
                    lines: std::mem::take(&mut lines),
                });
                dialogue_start = None;
            }
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    if !lines.is_empty() {
        let end = words.last().map(|w| w.end).unwrap_or_default();
        dialogues.push(Dialogue {
            start: dialogue_start.unwrap_or_default(),
            end,
            lines,
        });
    }

    dialogues
}

/// Render word-highlight captions.
pub fn render_highlight_ass(words: &[TimedWord], style: &HighlightStyle) -> MediaResult<String> {
    if words.is_empty() {
        return Err(MediaError::invalid_subtitle("no words found in word timings"));
    }

    let dialogues = group_words(words, style.words_per_line, style.max_lines);

    let text_color = ass_color(style.text_color);
    let highlight_color = ass_color(style.highlight_color);
    let back_color = ass_back_color(style.background.color, style.background.opacity);
    let border_style = if style.background.rounded { 4 } else { 1 };
    let margins = format!(
        "{},{},{}",
        style.padding_horizontal, style.padding_horizontal, style.padding_vertical
    );
    let display = |w: &TimedWord| {
        if style.uppercase {
            w.word.to_uppercase()
        } else {
            w.word.clone()
        }
    };

    let mut out = script_header("Highlight Subtitles");
    let _ = write!(
        out,
        "\nStyle: Base,{font},{size},{text},{text},{black},{back},-1,0,0,0,100,100,0,0,{border},3,0,{align},{margins},1",
        font = style.font_name,
        size = style.font_size,
        text = text_color,
        black = TRANSPARENT_BLACK,
        back = back_color,
        border = border_style,
        align = style.alignment,
        margins = margins,
    );
    let _ = write!(
        out,
        "\nStyle: Highlight,{font},{size},{text},{text},{hl},{black},-1,0,0,0,100,100,0,0,1,{hl_border},0,{align},{margins},1\n\n",
        font = style.font_name,
        size = style.font_size,
        text = text_color,
        hl = highlight_color,
        black = TRANSPARENT_BLACK,
        hl_border = style.highlight_border,
        align = style.alignment,
        margins = margins,
    );
    out.push_str("[Events]\n");
    out.push_str(EVENT_FORMAT);

    for dialogue in &dialogues {
        let full_text = dialogue
            .lines
            .iter()
            .map(|line| line.iter().map(display).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\\N");

        let _ = write!(
            out,
            "\nDialogue: 0,{},{},Base,,0,0,0,,{{\\an{}}}{}",
            format_ass_time(dialogue.start),
            format_ass_time(dialogue.end),
            style.alignment,
            full_text
        );

        let active_words = dialogue.lines.iter().flatten();
        for (active, active_word) in active_words.enumerate() {
            // Every word is laid out so positions match the base layer;
            // only the active one is visible.
            let mut position = 0;
            let highlight_text = dialogue
                .lines
                .iter()
                .map(|line| {
                    line.iter()
                        .map(|w| {
                            let text = display(w);
                            let part = if position == active {
                                format!(
                                    "{{\\r}}{{\\1c{}\\3c{}\\bord{}}}{}",
                                    text_color, highlight_color, style.highlight_border, text
                                )
                            } else {
                                format!("{{\\alpha&HFF&}}{}", text)
                            };
                            position += 1;
                            part
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join("\\N");

            let _ = write!(
                out,
                "\nDialogue: 2,{},{},Highlight,,0,0,0,,{{\\an{}}}{}",
                format_ass_time(active_word.start),
                format_ass_time(active_word.end),
                style.alignment,
                highlight_text
            );
        }
    }

    Ok(out)
}

/// Render an SRT file into a styled ASS file. Returns the cue count.
pub async fn write_segments_ass(srt_path: &Path, ass_path: &Path, style: &SegmentsStyle) -> MediaResult<usize> {
    let content = tokio::fs::read_to_string(srt_path).await?;
    let cues = parse_srt(&content)?;
    tokio::fs::write(ass_path, render_segments_ass(&cues, style)).await?;
    info!(cues = cues.len(), path = %ass_path.display(), "Rendered segment captions");
    Ok(cues.len())
}

/// Render a word-timing JSON file into a highlight ASS file. Returns the
/// dialogue count.
pub async fn write_highlight_ass(words_path: &Path, ass_path: &Path, style: &HighlightStyle) -> MediaResult<usize> {
    let content = tokio::fs::read(words_path).await?;
    let document: WordsDocument = serde_json::from_slice(&content)?;
    let rendered = render_highlight_ass(&document.words, style)?;
    tokio::fs::write(ass_path, rendered).await?;

    let dialogues = group_words(&document.words, style.words_per_line, style.max_lines).len();
    info!(
        words = document.words.len(),
        dialogues,
        path = %ass_path.display(),
        "Rendered highlight captions"
    );
    Ok(dialogues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> TimedWord {
        TimedWord {
            word: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_ass_colors_are_bgr() {
        assert_eq!(ass_color(RgbColor::new(214, 0, 0)), "&H000000D6&");
        assert_eq!(ass_back_color(RgbColor::BLACK, 128), "&H7F000000&");
        assert_eq!(ass_back_color(RgbColor::WHITE, 255), "&H00FFFFFF&");
    }

    #[test]
    fn test_format_ass_time() {
        assert_eq!(format_ass_time(0.0), "0:00:00.00");
        assert_eq!(format_ass_time(3725.5), "1:02:05.50");
        assert_eq!(format_ass_time(-1.0), "0:00:00.00");
        assert_eq!(format_ass_time(1.239), "0:00:01.24");
        assert_eq!(format_ass_time(0.29), "0:00:00.29");
        assert_eq!(format_ass_time(59.996), "0:01:00.00");
    }

    #[test]
    fn test_parse_srt() {
        let srt = "1\r\n00:00:01,500 --> 00:00:03,000\r\nHello\r\nworld\r\n\r\n2\r\n00:00:04,000 --> 00:00:05,250\r\nBye\r\n";
        let cues = parse_srt(srt).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, 1.5);
        assert_eq!(cues[0].text, "Hello\nworld");
        assert_eq!(cues[1].end, 5.25);
    }

    #[test]
    fn test_parse_srt_rejects_garbage() {
        assert!(parse_srt("<html>not subtitles</html>").is_err());
        assert!(parse_srt("1\n00:00:xx,000 --> 00:00:01,000\nhi").is_err());
    }

    #[test]
    fn test_segments_ass_layout() {
        let cues = vec![SrtCue {
            start: 1.0,
            end: 2.0,
            text: "line one\nline two".to_string(),
        }];
        let ass = render_segments_ass(&cues, &SegmentsStyle::default());

        assert!(ass.starts_with("[Script Info]\nTitle: Generated Subtitles"));
        assert!(ass.contains(
            "Style: Default,Arial,36,&H00FFFFFF&,&H00FFFFFF&,&H00000000&,&H00000000&,-1,0,0,0,100,100,0,0,1,3,0,2,10,10,20,1"
        ));
        assert!(ass.ends_with("Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,line one\\Nline two"));
    }

    #[test]
    fn test_group_words_by_count() {
        let words: Vec<TimedWord> = (0..10)
            .map(|i| word(&format!("w{}", i), i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect();
        let dialogues = group_words(&words, 4, 2);

        assert_eq!(dialogues.len(), 2);
        assert_eq!(dialogues[0].lines.len(), 2);
        assert_eq!(dialogues[0].lines[0].len(), 4);
        assert_eq!(dialogues[0].end, words[7].end);
        assert_eq!(dialogues[1].lines, vec![words[8..10].to_vec()]);
        assert_eq!(dialogues[1].start, words[8].start);
    }

    #[test]
    fn test_group_words_breaks_long_lines() {
        let words = vec![word("slow", 0.0, 2.0), word("speech", 2.0, 5.5), word("here", 6.0, 6.5)];
        let dialogues = group_words(&words, 4, 2);

        assert_eq!(dialogues.len(), 1);
        assert_eq!(dialogues[0].lines.len(), 2);
        assert_eq!(dialogues[0].lines[0].len(), 2);
    }

    #[test]
    fn test_highlight_events() {
        let words = vec![word(" hi ", 0.0, 0.5), word("there", 0.5, 1.0)];
        let ass = render_highlight_ass(&words, &HighlightStyle::default()).unwrap();

        assert!(ass.contains("Style: Base,Arial Black,72,"));
        assert!(ass.contains("Dialogue: 0,0:00:00.00,0:00:01.00,Base,,0,0,0,,{\\an2}HI THERE"));
        assert!(ass.contains(
            "Dialogue: 2,0:00:00.50,0:00:01.00,Highlight,,0,0,0,,{\\an2}{\\alpha&HFF&}HI {\\r}{\\1c&H00FFFFFF&\\3c&H000000D6&\\bord12}THERE"
        ));
        assert_eq!(ass.matches("Dialogue: 2,").count(), 2);
    }

    #[test]
    fn test_highlight_requires_words() {
        assert!(render_highlight_ass(&[], &HighlightStyle::default()).is_err());
    }
}
