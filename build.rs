fn main() {
    // The token grammar is compiled into the lexer by pest_derive
    println!("cargo:rerun-if-changed=src/lexer.pest");
}
