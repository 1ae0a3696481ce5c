#![allow(dead_code)]

use akiclient::{Theme, Transport};
use mockito::ServerGuard;
use reqwest::Client;

pub const GAME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>
    <script type="text/javascript">
        localStorage.setItem('identifiant', 'b4f6-88');
        localStorage.setItem('session', '318');
        localStorage.setItem('signature', '1029384756');
        localStorage.setItem('step', '0');
        localStorage.setItem('progression', '0.00000');
    </script>
    <div class="bubble-body">
        <p class="question-text" id="question-label">Is your character real?</p>
    </div>
</body>
</html>"#;

pub const BOOTSTRAP_PAGE: &str = r#"<html><head><script>
    var uid_ext_session = 'a2c8e1d0-1111';
    var frontaddr = 'NDYuMTA1LjExMC40NQ==';
</script></head></html>"#;

pub fn transport(server: &ServerGuard) -> Transport {
    Transport::with_client(Client::new(), server.url())
}

pub fn ws_theme(server: &ServerGuard) -> Theme {
    Theme {
        name: "Characters".to_owned(),
        url: format!("{}/ws", server.url()),
        subject_id: "1".to_owned(),
    }
}

pub fn flat_step(step: &str, progression: &str, question: &str) -> String {
    format!(
        r#"{{"completion":"OK","step":"{step}","progression":"{progression}","question_id":"31","question":"{question}"}}"#
    )
}

pub fn flat_proposition(step: &str, name: &str) -> String {
    format!(
        r#"{{"completion":"OK","step":"{step}","progression":"97.4","id_proposition":"1307","name_proposition":"{name}","description_proposition":"Fictional detective","photo":"https://photos.example/1307.jpg"}}"#
    )
}

pub fn jsonp_step(step: &str, progression: &str, question: &str) -> String {
    format!(
        r#"jQuery331023({{"completion":"OK","parameters":{{"question":"{question}","answers":[{{"answer":"Yes"}},{{"answer":"No"}},{{"answer":"Don't know"}},{{"answer":"Probably"}},{{"answer":"Probably not"}}],"step":"{step}","progression":"{progression}","questionid":"7","infogain":"0.54","status_minibase":"OK","options":[]}}}})"#
    )
}

pub fn jsonp_session() -> String {
    r#"jQuery331021({"completion":"OK","parameters":{"identification":{"channel":0,"session":"318","signature":"1029384756","challenge_auth":"f00d"},"step_information":{"question":"Is your character real?","answers":[{"answer":"Yes"},{"answer":"No"},{"answer":"Don't know"},{"answer":"Probably"},{"answer":"Probably not"}],"step":"0","progression":"0.00000","questionid":"266","infogain":"0.611"}}})"#
        .to_owned()
}
