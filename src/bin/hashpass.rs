//! Operator utility for seeding users by hand.
//!
//! ```text
//! hashpass <password>                  print an Argon2 hash
//! hashpass --verify <hash> <password>  check a password against a hash
//! ```

use book_catalog::auth::{self, CredentialError};
use std::{env, process::ExitCode};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.as_slice() {
        [flag, hash, password] if flag == "--verify" => match auth::check_password(hash, password) {
            Ok(()) => {
                println!("match");
                ExitCode::SUCCESS
            }
            Err(CredentialError::Mismatch) => {
                println!("no match");
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
        [password] if !password.starts_with("--") => match auth::hash_password(password) {
            Ok(hash) => {
                println!("{hash}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
        _ => {
            eprintln!("usage: hashpass <password>");
            eprintln!("       hashpass --verify <hash> <password>");
            ExitCode::from(2)
        }
    }
}
