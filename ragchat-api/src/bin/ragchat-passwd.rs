use ragchat_api::core::auth::hash_password;
use std::env;

fn main() {
    let Some(password) = env::args().nth(1) else {
        eprintln!("usage: ragchat-passwd <password>");
        std::process::exit(2);
    };

    match hash_password(&password) {
        Ok(hash) => println!("{hash}"),
        Err(e) => {
            eprintln!("Failed to hash password: {e}");
            std::process::exit(1);
        },
    }
}
