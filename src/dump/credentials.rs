use std::collections::HashMap;

use derive_more::{Display, Error};

use super::engine::Engine;

/// Login for the in-container dump utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,

    /// Only MySQL/MariaDB dumps take a password. Postgres dumps run as the
    /// in-container superuser over the local socket and need none.
    pub password: Option<String>,
}

/// No usable credentials in the container environment.
#[derive(Debug, Display, Error)]
#[display("Could not find username/password in the environment of container '{_0}'")]
pub struct MissingCredentials(#[error(ignore)] pub String);

impl Credentials {
    /// Extracts credentials from the container environment.
    ///
    /// MySQL and MariaDB images announce their users through pairs of
    /// `MYSQL_*`/`MARIADB_*` variables; the `MARIADB_` variant wins when both
    /// are set and a root password beats a user-level credential. Postgres
    /// falls back to the `postgres` superuser when `POSTGRES_USER` is unset.
    pub fn from_env(
        engine: Engine,
        container: &str,
        env: &HashMap<String, String>,
    ) -> Result<Self, MissingCredentials> {
        match engine {
            Engine::Postgres => {
                let user = env
                    .get("POSTGRES_USER")
                    .cloned()
                    .unwrap_or_else(|| "postgres".to_string());

                Ok(Self {
                    user,
                    password: None,
                })
            }
            Engine::Mysql | Engine::MariaDb => {
                let mut user = None;
                let mut password = None;

                if env.contains_key("MYSQL_USER") || env.contains_key("MARIADB_USER") {
                    user = env.get("MYSQL_USER").cloned();
                    if let Some(mariadb_user) = env.get("MARIADB_USER") {
                        user = Some(mariadb_user.clone());
                    }

                    password = env.get("MYSQL_PASSWORD").cloned();
                    if let Some(mariadb_password) = env.get("MARIADB_PASSWORD") {
                        password = Some(mariadb_password.clone());
                    }
                }

                if env.contains_key("MYSQL_ROOT_PASSWORD")
                    || env.contains_key("MARIADB_ROOT_PASSWORD")
                {
                    user = Some("root".to_string());
                    if let Some(root_password) = env.get("MYSQL_ROOT_PASSWORD") {
                        password = Some(root_password.clone());
                    }
                    if let Some(root_password) = env.get("MARIADB_ROOT_PASSWORD") {
                        password = Some(root_password.clone());
                    }
                }

                match (user, password) {
                    (Some(user), Some(password)) => Ok(Self {
                        user,
                        password: Some(password),
                    }),
                    _ => Err(MissingCredentials(container.to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn postgres_defaults_to_superuser() {
        let creds = Credentials::from_env(Engine::Postgres, "db", &env(&[])).unwrap();
        assert_eq!(creds.user, "postgres");
        assert_eq!(creds.password, None);
    }

    #[test]
    fn postgres_user_from_env() {
        let creds =
            Credentials::from_env(Engine::Postgres, "db", &env(&[("POSTGRES_USER", "nextcloud")]))
                .unwrap();
        assert_eq!(creds.user, "nextcloud");
    }

    #[test]
    fn mysql_user_and_password() {
        let creds = Credentials::from_env(
            Engine::Mysql,
            "db",
            &env(&[("MYSQL_USER", "app"), ("MYSQL_PASSWORD", "secret")]),
        )
        .unwrap();
        assert_eq!(creds.user, "app");
        assert_eq!(creds.password.as_deref(), Some("secret"));
    }

    #[test]
    fn mariadb_variables_win_over_mysql_ones() {
        let creds = Credentials::from_env(
            Engine::MariaDb,
            "db",
            &env(&[
                ("MYSQL_USER", "legacy"),
                ("MYSQL_PASSWORD", "old"),
                ("MARIADB_USER", "app"),
                ("MARIADB_PASSWORD", "new"),
            ]),
        )
        .unwrap();
        assert_eq!(creds.user, "app");
        assert_eq!(creds.password.as_deref(), Some("new"));
    }

    #[test]
    fn root_password_overrides_user_credentials() {
        let creds = Credentials::from_env(
            Engine::MariaDb,
            "db",
            &env(&[
                ("MARIADB_USER", "app"),
                ("MARIADB_PASSWORD", "secret"),
                ("MARIADB_ROOT_PASSWORD", "toor"),
            ]),
        )
        .unwrap();
        assert_eq!(creds.user, "root");
        assert_eq!(creds.password.as_deref(), Some("toor"));
    }

    #[test]
    fn root_password_completes_a_passwordless_user() {
        let creds = Credentials::from_env(
            Engine::Mysql,
            "db",
            &env(&[("MYSQL_USER", "app"), ("MYSQL_ROOT_PASSWORD", "toor")]),
        )
        .unwrap();
        assert_eq!(creds.user, "root");
        assert_eq!(creds.password.as_deref(), Some("toor"));
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let err = Credentials::from_env(Engine::Mysql, "db", &env(&[("MYSQL_USER", "app")]))
            .unwrap_err();
        assert!(err.to_string().contains("db"));
    }
}
