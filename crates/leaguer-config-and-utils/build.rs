fn main() {
    // option_env!() values are baked in at compile time; rebuild when they change.
    println!("cargo:rerun-if-env-changed=LEAGUER_BACKEND_URL");
    println!("cargo:rerun-if-env-changed=LEAGUER_WS_HOST");
    println!("cargo:rerun-if-env-changed=LEAGUER_ENCRYPTION_KEY");
}
