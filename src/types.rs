pub use crate::utils::database;
use async_trait::async_trait;
use std::env;
use uri_parser::parse_uri;
use urlencoding::decode;

#[derive(Clone)]
pub enum AppEnvironment {
    Production,
    Development,
}

impl AppEnvironment {
    pub fn from(raw_environment: String) -> Self {
        match raw_environment.as_ref() {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub host: String,
    pub environment: AppEnvironment,
    pub port: u32,
    pub url: String,
}

#[derive(Clone)]
pub struct MailContext {
    pub host: String,
    pub sender: String,
    pub user: String,
    pub password: String,
}

#[derive(Clone)]
pub struct GoogleContext {
    pub userinfo_endpoint: String,
}

#[derive(Clone)]
pub struct Context {
    pub app: AppContext,
    pub db_conn: database::DatabaseConnection,
    pub mail: MailContext,
    pub google: GoogleContext,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub environment: AppEnvironment,
    pub port: u32,
    pub url: String,
}

#[derive(Clone)]
pub struct MailConfig {
    pub sender: String,
    pub uri: String,
}

#[derive(Clone)]
pub struct GoogleConfig {
    pub userinfo_endpoint: String,
}

#[derive(Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub app: AppConfig,
    pub mail: MailConfig,
    pub google: GoogleConfig,
}

impl Default for Config {
    fn default() -> Self {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let environment = env::var("APP_ENV").expect("APP_ENV not set");
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u32>()
            .expect("Invalid PORT number");
        let url = env::var("URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let mail_sender = env::var("MAIL_SENDER").expect("MAIL_SENDER not set");
        let mail_uri = env::var("MAIL_URI").expect("MAIL_URI not set");
        let google_userinfo_endpoint = env::var("GOOGLE_USERINFO_ENDPOINT")
            .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/userinfo".to_string());

        Self {
            database: DatabaseConfig { url: database_url },
            app: AppConfig {
                host,
                environment: AppEnvironment::from(environment),
                port,
                url,
            },
            mail: MailConfig {
                sender: mail_sender,
                uri: mail_uri,
            },
            google: GoogleConfig {
                userinfo_endpoint: google_userinfo_endpoint,
            },
        }
    }
}

#[async_trait]
pub trait ToContext {
    async fn to_context(self) -> Context;
}

#[async_trait]
impl ToContext for Config {
    async fn to_context(self) -> Context {
        let db_conn = database::connect(self.database.url.as_str()).await;
        database::migrate(db_conn.clone()).await;

        let parsed_mail_uri = parse_uri(&self.mail.uri).expect("Invalid mail uri");
        let mail_host = parsed_mail_uri.host.expect("Invalid mail host").to_string();
        let mail_user = parsed_mail_uri.user.expect("Invalid mail user");
        let mail_password = decode(mail_user.password.expect("Invalid mail password"))
            .expect("Invalid mail password")
            .to_string();
        let mail_user = decode(mail_user.name)
            .expect("Invalid mail user")
            .to_string();

        Context {
            app: AppContext {
                host: self.app.host,
                environment: self.app.environment,
                port: self.app.port,
                url: self.app.url,
            },
            db_conn: db_conn.clone(),
            mail: MailContext {
                sender: self.mail.sender,
                user: mail_user,
                password: mail_password,
                host: mail_host,
            },
            google: GoogleContext {
                userinfo_endpoint: self.google.userinfo_endpoint,
            },
        }
    }
}
