use clap::{Parser, Subcommand};
use scireview_core::auth::password::BCRYPT_COST;

#[derive(Parser, Debug)]
#[command(name = "scireview", version, about = "Sci Review operator tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Print a random key suitable for JWT_KEY.
    GenKey {
        #[arg(long, default_value_t = 64)]
        length: usize,
    },

    /// Print the bcrypt hash of a password.
    HashPassword {
        password: String,

        #[arg(long, default_value_t = BCRYPT_COST)]
        cost: u32,
    },

    /// Verify a token with the JWT_* settings and print its claims.
    VerifyToken { token: String },

    /// Create an active admin account unless the email is taken.
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "postgres://localhost:5432/sci_review"
        )]
        database_url: String,
    },
}
