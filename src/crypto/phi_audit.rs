// Source audit: decrypted prescription fields must never reach the logs or
// an API error message. Scans every tracing call in src/ (including ones
// nested inside closures) and every `format!` or `ApiError` constructor
// under src/api/.
