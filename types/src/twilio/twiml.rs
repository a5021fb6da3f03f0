//! Minimal TwiML document builder for voice webhooks.

use std::fmt;

use quick_xml::escape::escape;

#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Say { text: String, voice: Option<String> },
    Pause { length: u32 },
    Connect(Vec<Noun>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Noun {
    Stream { url: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: &str, voice: Option<&str>) -> Self {
        self.verbs.push(Verb::Say {
            text: text.to_string(),
            voice: voice.map(str::to_string),
        });
        self
    }

    pub fn pause(mut self, length: u32) -> Self {
        self.verbs.push(Verb::Pause { length });
        self
    }

    /// `<Connect><Stream url=".."/></Connect>`
    pub fn connect_stream(mut self, url: &str) -> Self {
        self.verbs.push(Verb::Connect(vec![Noun::Stream {
            url: url.to_string(),
        }]));
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }
}

impl fmt::Display for VoiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#)?;
        for verb in &self.verbs {
            match verb {
                Verb::Say { text, voice } => {
                    match voice {
                        Some(voice) => write!(f, r#"<Say voice="{}">"#, escape(voice))?,
                        None => f.write_str("<Say>")?,
                    }
                    write!(f, "{}</Say>", escape(text))?;
                }
                Verb::Pause { length } => write!(f, r#"<Pause length="{}"/>"#, length)?,
                Verb::Connect(nouns) => {
                    f.write_str("<Connect>")?;
                    for noun in nouns {
                        match noun {
                            Noun::Stream { url } => {
                                write!(f, r#"<Stream url="{}"/>"#, escape(url))?
                            }
                        }
                    }
                    f.write_str("</Connect>")?;
                }
            }
        }
        f.write_str("</Response>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_greeting_and_stream() {
        let xml = VoiceResponse::new()
            .say("Hello.", Some("Polly.Matthew"))
            .pause(1)
            .connect_stream("wss://example.ngrok.app/media-stream")
            .to_string();

        assert_eq!(
            xml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#,
                r#"<Say voice="Polly.Matthew">Hello.</Say>"#,
                r#"<Pause length="1"/>"#,
                r#"<Connect><Stream url="wss://example.ngrok.app/media-stream"/></Connect>"#,
                "</Response>"
            )
        );
    }

    #[test]
    fn escapes_markup_in_text() {
        let xml = VoiceResponse::new().say("Food & water <today>", None).to_string();
        assert!(xml.contains("<Say>Food &amp; water &lt;today&gt;</Say>"));

        let xml = VoiceResponse::new()
            .connect_stream(r#"wss://example.org/media-stream?a=1&b="2""#)
            .to_string();
        assert!(xml.contains(
            r#"<Stream url="wss://example.org/media-stream?a=1&amp;b=&quot;2&quot;"/>"#
        ));
    }
}
