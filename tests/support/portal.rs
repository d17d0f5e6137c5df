//! A fake teaching portal and identity provider on a wiremock server, plus
//! credential test doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use uploader_core::{CredentialError, PortalConfig, Prompter, SecretStore};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const LOGIN_PATH: &str = "/idp/profile/SAML2/Redirect/SSO";
pub const ACS_PATH: &str = "/Shibboleth.sso/SAML2/POST";
pub const EXAM_PATH: &str = "/student/confirm-exam-number";
pub const SUBMIT_PATH: &str = "/student/2021-2/submit/COM00012C/901/A";
pub const SUBMIT_REL: &str = "2021-2/submit/COM00012C/901/A";

pub const LOGIN_TOKEN: &str = "idp-csrf-1";
pub const PORTAL_TOKEN: &str = "portal-csrf-2";
pub const SESSION_COOKIE: &str = "laravel_session";

pub fn portal_config(server: &MockServer) -> PortalConfig {
    let base = server.uri();
    PortalConfig::with_endpoints(
        Url::parse(&format!("{base}{LOGIN_PATH}?execution=e1s1")).unwrap(),
        Url::parse(&format!("{base}{EXAM_PATH}")).unwrap(),
        Url::parse(&format!("{base}/student")).unwrap(),
    )
}

pub fn target_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{SUBMIT_PATH}", server.uri())).unwrap()
}

/// Config file contents pointing the binary at `server`.
pub fn config_file_contents(server: &MockServer) -> String {
    let base = server.uri();
    format!(
        "# fake portal\n\
         login_url = \"{base}{LOGIN_PATH}?execution=e1s1\"\n\
         exam_number_url = \"{base}{EXAM_PATH}\"\n\
         submit_base = \"{base}/student\"\n\
         connect_timeout_secs = 5\n\
         read_timeout_secs = 10\n"
    )
}

pub fn login_page() -> String {
    format!(
        r#"<html><body><form method="post" action="{LOGIN_PATH}?execution=e1s1">
             <input type="hidden" name="csrf_token" value="{LOGIN_TOKEN}">
             <input name="j_username"><input type="password" name="j_password">
           </form></body></html>"#
    )
}

pub fn saml_handoff_page() -> String {
    format!(
        r#"<html><body onload="document.forms[0].submit()">
             <form action="{ACS_PATH}" method="post">
               <input type="hidden" name="RelayState" value="cookie:1700000000_ab12">
               <input type="hidden" name="SAMLResponse" value="PHNhbWxwOlJlc3BvbnNlPg==">
             </form></body></html>"#
    )
}

pub fn portal_page(token: &str) -> String {
    format!(
        r#"<!doctype html><html><head><meta name="csrf-token" content="{token}"></head>
           <body>Teaching portal</body></html>"#
    )
}

fn redirect_to(location: String) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", location.as_str())
}

/// Every request after login must carry the portal session cookie.
pub fn has_session_cookie(request: &Request) -> bool {
    request
        .headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookies| cookies.contains(&format!("{SESSION_COOKIE}=")))
}

/// Target redirects to the fresh-login page.
pub async fn mount_target_redirects_to_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(SUBMIT_PATH))
        .respond_with(redirect_to(format!(
            "{}{LOGIN_PATH}?execution=e1s1",
            server.uri()
        )))
        .expect(1)
        .mount(server)
        .await;
}

/// Target redirects to the exam number page.
pub async fn mount_target_redirects_to_exam(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(SUBMIT_PATH))
        .respond_with(redirect_to(format!("{}{EXAM_PATH}", server.uri())))
        .expect(1)
        .mount(server)
        .await;
}

/// Identity provider: login form, credential POST and SAML hand-off. The
/// hand-off lands on the exam number page with a fresh portal session.
pub async fn mount_identity_provider(server: &MockServer, expected_logins: u64) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .and(query_param("execution", "e1s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page()))
        .expect(expected_logins)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(query_param("execution", "e1s1"))
        .and(body_string_contains(format!("csrf_token={LOGIN_TOKEN}")))
        .and(body_string_contains("j_username=ab1234"))
        .and(body_string_contains("j_password=hunter2"))
        .and(body_string_contains("_eventId_proceed="))
        .respond_with(ResponseTemplate::new(200).set_body_string(saml_handoff_page()))
        .expect(expected_logins)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(ACS_PATH))
        .and(body_string_contains("SAMLResponse="))
        .and(body_string_contains("RelayState="))
        .respond_with(
            redirect_to(format!("{}{EXAM_PATH}", server.uri()))
                .insert_header("Set-Cookie", format!("{SESSION_COOKIE}=sess123; Path=/").as_str()),
        )
        .expect(expected_logins)
        .mount(server)
        .await;
}

/// Exam number page and confirmation POST.
pub async fn mount_exam_number(server: &MockServer, expected_confirmations: u64) {
    Mock::given(method("GET"))
        .and(path(EXAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(portal_page(PORTAL_TOKEN)))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(EXAM_PATH))
        .and(query_param("_token", PORTAL_TOKEN))
        .and(query_param("examNumber", "Y1234567"))
        .respond_with(ResponseTemplate::new(200).set_body_string(portal_page(PORTAL_TOKEN)))
        .expect(expected_confirmations)
        .mount(server)
        .await;
}

/// Multipart upload to the target.
pub async fn mount_upload(server: &MockServer, token: &str, expected_uploads: u64) {
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(body_string_contains("name=\"_token\""))
        .and(body_string_contains(token))
        .and(body_string_contains("name=\"file\"; filename=\"exam.zip\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("Submission received"))
        .expect(expected_uploads)
        .mount(server)
        .await;
}

/// In-memory secret store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn entry(&self, service: &str, account: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&(service.to_string(), account.to_string()))
            .cloned()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.entry(service, account))
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), CredentialError> {
        self.entries.lock().unwrap().insert(
            (service.to_string(), account.to_string()),
            secret.to_string(),
        );
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .remove(&(service.to_string(), account.to_string()))
            .is_some())
    }
}

/// Answers prompts from a fixed list, in order.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(ToString::to_string).collect()),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt_plain(&self, label: &str) -> Result<String, CredentialError> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("unexpected prompt for {label}")))
    }

    fn prompt_secret(&self, label: &str) -> Result<String, CredentialError> {
        self.prompt_plain(label)
    }
}
