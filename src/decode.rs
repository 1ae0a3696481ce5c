//! Parsers for everything the service sends back.
//!
//! The service mixes HTML pages with inline scripts, flat JSON objects and
//! JSONP-wrapped JSON. All scraping lives here as pure functions so that
//! markup changes surface as a [`ClientError::Protocol`] and can be pinned
//! down with sample payloads.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use crate::{
    error::{ClientError, ClientResult, Operation},
    model::Guess,
    session::SessionCursor,
    theme::Theme,
};

const COMPLETION_OK: &str = "OK";

static STATE_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"localStorage\.setItem\('([^']*)', '([^']*)'\);").expect("valid regex")
});
static QUESTION_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p[^>]*>([^<]*)</p>").expect("valid regex"));
static UID_EXT_SESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var uid_ext_session = '([^']*)'").expect("valid regex"));
static FRONTADDR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var frontaddr = '([^']*)'").expect("valid regex"));
static THEMES_TO_PLAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'arrUrlThemesToPlay', (\[.*?\])\);").expect("valid regex"));

/// A decoded question step, common to both protocols.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    pub question: String,
    pub answers: Vec<String>,
    pub step: String,
    /// Percentage kept as the numeric string the service sent.
    pub progression: String,
    pub question_id: String,
    pub infogain: String,
    pub status_minibase: String,
    pub options: Value,
    /// Set when the payload proposes a subject instead of a question.
    pub guess: Option<Guess>,
}

/// Session tokens returned by `new_session`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub session: String,
    pub signature: String,
    pub challenge_auth: String,
    pub step: Step,
}

/// Tokens scraped from the query protocol's game page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    pub uid_ext_session: String,
    pub frontaddr: String,
}

/// Returns the text between the first `(` and the last `)`.
pub fn strip_jsonp(operation: Operation, body: &str) -> ClientResult<&str> {
    let open = body
        .find('(')
        .ok_or_else(|| ClientError::protocol(operation, "JSONP payload has no opening `(`"))?;
    let close = body
        .rfind(')')
        .ok_or_else(|| ClientError::protocol(operation, "JSONP payload has no closing `)`"))?;

    if close <= open {
        return Err(ClientError::protocol(
            operation,
            "JSONP payload parentheses are out of order",
        ));
    }

    Ok(&body[open + 1..close])
}

/// Parses a bare JSON object, or unwraps a JSONP callback first.
fn parse_payload<T: DeserializeOwned>(operation: Operation, body: &str) -> ClientResult<T> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ClientError::protocol(operation, "empty response body"));
    }

    let json = if body.starts_with('{') {
        body
    } else {
        strip_jsonp(operation, body)?
    };

    serde_json::from_str(json).map_err(|err| {
        tracing::warn!("{operation}: could not decode payload `{json}`: {err}");
        ClientError::protocol(operation, format!("malformed JSON: {err}"))
    })
}

fn check_completion(operation: Operation, completion: &str) -> ClientResult<()> {
    if completion == COMPLETION_OK {
        Ok(())
    } else {
        Err(ClientError::protocol(
            operation,
            format!("completion was `{completion}`"),
        ))
    }
}

/// Decodes an answer, undo or exclude response in any of the shapes the
/// service uses: flat legacy objects, `{"parameters": {...}}` objects and
/// their JSONP-wrapped form.
pub fn decode_step(operation: Operation, body: &str) -> ClientResult<Step> {
    let envelope: StepEnvelope = parse_payload(operation, body)?;
    check_completion(operation, &envelope.completion)?;

    Ok(envelope.parameters.unwrap_or(envelope.flat).into_step())
}

pub fn decode_session(operation: Operation, body: &str) -> ClientResult<SessionStart> {
    let envelope: SessionEnvelope = parse_payload(operation, body)?;
    check_completion(operation, &envelope.completion)?;

    let parameters = envelope
        .parameters
        .ok_or_else(|| ClientError::protocol(operation, "session payload has no parameters"))?;
    let identification = parameters.identification;

    Ok(SessionStart {
        session: identification.session,
        signature: identification.signature,
        challenge_auth: identification.challenge_auth,
        step: parameters.step_information.into_step(),
    })
}

/// Guesses with a positive probability, in the order the service ranked them.
pub fn decode_guesses(operation: Operation, body: &str) -> ClientResult<Vec<Guess>> {
    let envelope: ListEnvelope = parse_payload(operation, body)?;
    check_completion(operation, &envelope.completion)?;

    let elements = envelope
        .parameters
        .map(|parameters| parameters.elements)
        .unwrap_or_default();

    Ok(elements
        .into_iter()
        .map(|wrapper| wrapper.element.into_guess())
        .filter(|guess| guess.probability > 0.0)
        .collect())
}

/// Scrapes the legacy game page: inline `localStorage` assignments and the question label.
pub fn parse_game_page(operation: Operation, html: &str) -> ClientResult<SessionCursor> {
    let mut cursor = SessionCursor::default();

    for line in html.lines().map(str::trim) {
        if line.starts_with("localStorage.setItem(") {
            let Some(captures) = STATE_ASSIGNMENT.captures(line) else {
                continue;
            };
            let value = captures[2].to_owned();

            match &captures[1] {
                "step" => cursor.step = value,
                "progression" => cursor.progression = value,
                "signature" => cursor.signature = value,
                "session" => cursor.session = value,
                "identifiant" => cursor.identifier = value,
                _ => {}
            }
        } else if line.contains(r#"id="question-label""#) {
            if let Some(captures) = QUESTION_LABEL.captures(line) {
                cursor.question = unescape_html(&captures[1]);
            }
        }
    }

    cursor.validate(operation)?;
    Ok(cursor)
}

pub fn parse_bootstrap_page(operation: Operation, html: &str) -> ClientResult<Bootstrap> {
    Ok(Bootstrap {
        uid_ext_session: script_variable(operation, &UID_EXT_SESSION, "uid_ext_session", html)?,
        frontaddr: script_variable(operation, &FRONTADDR, "frontaddr", html)?,
    })
}

fn script_variable(
    operation: Operation,
    regex: &Regex,
    name: &str,
    html: &str,
) -> ClientResult<String> {
    regex
        .captures(html)
        .map(|captures| captures[1].to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ClientError::protocol(operation, format!("could not locate {name}")))
}

pub fn parse_theme_page(operation: Operation, html: &str) -> ClientResult<Vec<Theme>> {
    let captures = THEMES_TO_PLAY
        .captures(html)
        .ok_or_else(|| ClientError::protocol(operation, "could not locate the theme list"))?;

    serde_json::from_str(&captures[1])
        .map_err(|err| ClientError::protocol(operation, format!("malformed theme list: {err}")))
}

fn unescape_html(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Accepts both `"12"` and `12`, since the service is not consistent about it.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct StepEnvelope {
    #[serde(default, deserialize_with = "lenient_string")]
    completion: String,
    #[serde(default)]
    parameters: Option<RawStep>,
    #[serde(flatten)]
    flat: RawStep,
}

#[derive(Debug, Default, Deserialize)]
struct RawStep {
    #[serde(default, deserialize_with = "lenient_string")]
    question: String,
    #[serde(default)]
    answers: Vec<RawAnswer>,
    #[serde(default, deserialize_with = "lenient_string")]
    step: String,
    #[serde(default, deserialize_with = "lenient_string")]
    progression: String,
    #[serde(default, alias = "question_id", deserialize_with = "lenient_string")]
    questionid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    infogain: String,
    #[serde(default, deserialize_with = "lenient_string")]
    status_minibase: String,
    #[serde(default)]
    options: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    id_proposition: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name_proposition: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description_proposition: String,
    #[serde(default, deserialize_with = "lenient_string")]
    photo: String,
}

#[derive(Debug, Deserialize)]
struct RawAnswer {
    #[serde(default, deserialize_with = "lenient_string")]
    answer: String,
}

impl RawStep {
    fn into_step(self) -> Step {
        // A proposition carries no probability of its own; the progression is
        // the service's confidence in it.
        let confidence = self.progression.trim().parse().unwrap_or(0.0);
        let guess = (!self.name_proposition.is_empty()).then(|| Guess {
            id: self.id_proposition,
            name: self.name_proposition,
            description: self.description_proposition,
            probability: confidence,
            image_url: self.photo,
        });

        Step {
            question: self.question,
            answers: self.answers.into_iter().map(|a| a.answer).collect(),
            step: self.step,
            progression: self.progression,
            question_id: self.questionid,
            infogain: self.infogain,
            status_minibase: self.status_minibase,
            options: self.options,
            guess,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    #[serde(default, deserialize_with = "lenient_string")]
    completion: String,
    #[serde(default)]
    parameters: Option<SessionParameters>,
}

#[derive(Debug, Deserialize)]
struct SessionParameters {
    identification: Identification,
    step_information: RawStep,
}

#[derive(Debug, Deserialize)]
struct Identification {
    #[serde(default, deserialize_with = "lenient_string")]
    session: String,
    #[serde(default, deserialize_with = "lenient_string")]
    signature: String,
    #[serde(default, deserialize_with = "lenient_string")]
    challenge_auth: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default, deserialize_with = "lenient_string")]
    completion: String,
    #[serde(default)]
    parameters: Option<ListParameters>,
}

#[derive(Debug, Deserialize)]
struct ListParameters {
    #[serde(default)]
    elements: Vec<ElementWrapper>,
}

#[derive(Debug, Deserialize)]
struct ElementWrapper {
    element: Element,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    proba: String,
    #[serde(default, deserialize_with = "lenient_string")]
    absolute_picture_path: String,
}

impl Element {
    fn into_guess(self) -> Guess {
        let fraction: f64 = self.proba.trim().parse().unwrap_or(0.0);

        Guess {
            id: self.id,
            name: self.name,
            description: self.description,
            probability: fraction * 100.0,
            image_url: self.absolute_picture_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OP: Operation = Operation::SubmitAnswer;

    const STEP_JSON: &str = r#"{"completion":"OK","parameters":{"question":"Is your character a girl?","answers":[{"answer":"Yes"},{"answer":"No"},{"answer":"Don't know"},{"answer":"Probably"},{"answer":"Probably not"}],"step":"1","progression":"3.21","questionid":"1","infogain":"0.68","status_minibase":"OK","options":[]}}"#;

    #[test]
    fn jsonp_and_bare_json_decode_alike() {
        let wrapped = format!("jQuery331023({STEP_JSON})");

        let from_jsonp = decode_step(OP, &wrapped).unwrap();
        let from_json = decode_step(OP, STEP_JSON).unwrap();

        assert_eq!(from_jsonp, from_json);
        assert_eq!(from_json.question, "Is your character a girl?");
        assert_eq!(from_json.answers.len(), 5);
        assert_eq!(from_json.step, "1");
        assert_eq!(from_json.progression, "3.21");
        assert_eq!(from_json.infogain, "0.68");
        assert!(from_json.guess.is_none());
    }

    #[test]
    fn strip_jsonp_guards_malformed_wrappers() {
        assert_eq!(strip_jsonp(OP, "cb({})").unwrap(), "{}");
        assert_eq!(strip_jsonp(OP, "cb({\"a\":\"(x)\"});").unwrap(), "{\"a\":\"(x)\"}");
        assert!(strip_jsonp(OP, "").is_err());
        assert!(strip_jsonp(OP, "(").is_err());
        assert!(strip_jsonp(OP, ")(").is_err());
        assert!(strip_jsonp(OP, "no parens").is_err());
    }

    #[test]
    fn non_ok_completion_is_rejected() {
        let err = decode_step(OP, r#"jQuery1({"completion":"KO - TIMEOUT"})"#).unwrap_err();

        assert_eq!(
            err.to_string(),
            "submit_answer: unexpected response: completion was `KO - TIMEOUT`"
        );
    }

    #[test]
    fn empty_body_is_a_protocol_error() {
        assert!(matches!(
            decode_step(OP, "   "),
            Err(ClientError::Protocol { .. })
        ));
    }

    #[test]
    fn flat_legacy_payload_with_guess() {
        let body = r#"{"completion":"OK","step":"21","progression":"97.1","id_proposition":"1307","name_proposition":"Sherlock Holmes","description_proposition":"Fictional detective","photo":"https://photos.example/1307.jpg"}"#;

        let step = decode_step(OP, body).unwrap();

        assert_eq!(step.step, "21");
        assert_eq!(
            step.guess,
            Some(Guess {
                id: "1307".to_owned(),
                name: "Sherlock Holmes".to_owned(),
                description: "Fictional detective".to_owned(),
                probability: 97.1,
                image_url: "https://photos.example/1307.jpg".to_owned(),
            })
        );
    }

    #[test]
    fn numeric_fields_are_accepted() {
        let step = decode_step(OP, r#"{"completion":"OK","step":4,"progression":12.5}"#).unwrap();

        assert_eq!(step.step, "4");
        assert_eq!(step.progression, "12.5");
    }

    #[test]
    fn session_payload() {
        let body = r#"jQuery77({"completion":"OK","parameters":{"identification":{"channel":0,"session":"318","signature":"1029384756","challenge_auth":"f00d"},"step_information":{"question":"Is your character real?","answers":[{"answer":"Yes"},{"answer":"No"}],"step":"0","progression":"0.00000","questionid":"266","infogain":"0.611"}}})"#;

        let start = decode_session(Operation::StartGame, body).unwrap();

        assert_eq!(start.session, "318");
        assert_eq!(start.signature, "1029384756");
        assert_eq!(start.challenge_auth, "f00d");
        assert_eq!(start.step.question, "Is your character real?");
        assert_eq!(start.step.answers, vec!["Yes", "No"]);
    }

    #[test]
    fn guesses_are_scaled_and_filtered() {
        let body = r#"jQuery5({"completion":"OK","parameters":{"elements":[
            {"element":{"id":"1","name":"Sherlock Holmes","description":"Detective","proba":"0.8734","absolute_picture_path":"https://photos.example/1.jpg"}},
            {"element":{"id":"2","name":"Dr. Watson","description":"Doctor","proba":"0.1","absolute_picture_path":""}},
            {"element":{"id":"3","name":"Moriarty","description":"Villain","proba":"0","absolute_picture_path":""}}
        ],"NbObjetsPertinents":"3"}})"#;

        let guesses = decode_guesses(Operation::ListGuesses, body).unwrap();

        assert_eq!(
            guesses.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["Sherlock Holmes", "Dr. Watson"]
        );
        assert!((guesses[0].probability - 87.34).abs() < 1e-9);
        assert_eq!(guesses[0].image_url, "https://photos.example/1.jpg");
    }

    #[test]
    fn empty_guess_list_is_not_an_error() {
        let body = r#"jQuery5({"completion":"OK","parameters":{"elements":[],"NbObjetsPertinents":"0"}})"#;

        assert!(decode_guesses(Operation::ListGuesses, body).unwrap().is_empty());
    }

    const GAME_PAGE: &str = r#"<html><body>
        <script>
            localStorage.setItem('identifiant', 'b4f6-88');
            localStorage.setItem('session', '318');
            localStorage.setItem('signature', '1029384756');
            localStorage.setItem('step', '0');
            localStorage.setItem('progression', '0.00000');
            localStorage.setItem('unrelated', 'value');
        </script>
        <p class="question-text" id="question-label">Is your character&#39;s gender female?</p>
    </body></html>"#;

    #[test]
    fn legacy_game_page() {
        let cursor = parse_game_page(Operation::StartGame, GAME_PAGE).unwrap();

        assert_eq!(
            cursor,
            SessionCursor {
                step: "0".to_owned(),
                progression: "0.00000".to_owned(),
                signature: "1029384756".to_owned(),
                session: "318".to_owned(),
                identifier: "b4f6-88".to_owned(),
                question: "Is your character's gender female?".to_owned(),
            }
        );
    }

    #[test]
    fn legacy_game_page_without_signature() {
        let page = GAME_PAGE.replace("localStorage.setItem('signature', '1029384756');", "");

        let err = parse_game_page(Operation::StartGame, &page).unwrap_err();
        assert!(err.to_string().contains("signature cannot be empty"));
    }

    #[test]
    fn bootstrap_page() {
        let page = r#"<script>
            var uid_ext_session = 'a2c8e1d0-1111';
            var frontaddr = 'NDYuMTA1LjExMC40NQ==';
        </script>"#;

        assert_eq!(
            parse_bootstrap_page(Operation::StartGame, page).unwrap(),
            Bootstrap {
                uid_ext_session: "a2c8e1d0-1111".to_owned(),
                frontaddr: "NDYuMTA1LjExMC40NQ==".to_owned(),
            }
        );

        let err = parse_bootstrap_page(Operation::StartGame, "var uid_ext_session = 'x';")
            .unwrap_err();
        assert!(err.to_string().contains("frontaddr"));
    }

    #[test]
    fn theme_page() {
        let page = r#"<script>localStorage.setItem('arrUrlThemesToPlay', [{"translated_theme_name":"Characters","urlWs":"https:\/\/srv3.akinator.com:9331\/ws","subject_id":"1"},{"translated_theme_name":"Animals","urlWs":"https:\/\/srv3.akinator.com:9333\/ws","subject_id":"14"}]);</script>"#;

        let themes = parse_theme_page(Operation::ListThemes, page).unwrap();

        assert_eq!(themes.len(), 2);
        assert_eq!(themes[1].name, "Animals");
        assert_eq!(themes[1].url, "https://srv3.akinator.com:9333/ws");
        assert_eq!(themes[1].subject_id, "14");

        assert!(parse_theme_page(Operation::ListThemes, "<html></html>").is_err());
    }

    #[test]
    fn theme_page_with_more_script_on_the_line() {
        let page = r#"<script>localStorage.setItem('arrUrlThemesToPlay', [{"translated_theme_name":"Objects","urlWs":"https:\/\/srv3.akinator.com:9332\/ws","subject_id":"2"}]);localStorage.setItem('lang', 'en');</script>"#;

        let themes = parse_theme_page(Operation::ListThemes, page).unwrap();

        assert_eq!(themes.len(), 1);
        assert_eq!(themes[0].name, "Objects");
        assert_eq!(themes[0].subject_id, "2");
    }
}
