use derive_more::Display;

use super::credentials::Credentials;

/// Database engines with a supported native dump utility.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[display("mysql")]
    Mysql,
    #[display("mariadb")]
    MariaDb,
    #[display("postgres")]
    Postgres,
}

impl Engine {
    /// Classifies a container by substring matches over its image tags.
    ///
    /// Later checks win: a `mariadb` tag beats `mysql` (official MariaDB
    /// images historically carried both) and `postgres`/`postgis` beat both.
    /// `None` means the container holds no supported database and is ignored.
    pub fn classify(image_tags: &str) -> Option<Engine> {
        let haystack = image_tags.to_lowercase();

        let mut engine = None;
        if haystack.contains("mysql") {
            engine = Some(Engine::Mysql);
        }
        if haystack.contains("mariadb") {
            engine = Some(Engine::MariaDb);
        }
        if haystack.contains("postgres") || haystack.contains("postgis") {
            engine = Some(Engine::Postgres);
        }

        engine
    }

    /// The in-container dump invocation, program first.
    ///
    /// Without a `database` the whole cluster is dumped (`--all-databases`
    /// resp. `pg_dumpall`); with one only that database.
    pub fn dump_command(self, credentials: &Credentials, database: Option<&str>) -> Vec<String> {
        match self {
            Engine::Mysql | Engine::MariaDb => {
                let program = match self {
                    Engine::MariaDb => "mariadb-dump",
                    _ => "mysqldump",
                };

                let mut command = vec![
                    program.to_string(),
                    "-u".to_string(),
                    credentials.user.clone(),
                    format!("-p{}", credentials.password.as_deref().unwrap_or_default()),
                    "--single-transaction".to_string(),
                    "--skip-lock-tables".to_string(),
                ];
                match database {
                    Some(database) => command.push(database.to_string()),
                    None => command.push("--all-databases".to_string()),
                }

                command
            }
            Engine::Postgres => match database {
                Some(database) => vec![
                    "pg_dump".to_string(),
                    "-U".to_string(),
                    credentials.user.clone(),
                    "-d".to_string(),
                    database.to_string(),
                ],
                None => vec![
                    "pg_dumpall".to_string(),
                    "--username".to_string(),
                    credentials.user.clone(),
                ],
            },
        }
    }
}
