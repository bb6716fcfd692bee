//! decision-log REPL
//!
//! Interactive decision journal. Records live for the session only; use
//! `/export` to keep them.
//!
//! Run with: cargo run
//! Set GEMINI_API_KEY to enable `/suggest` and `/analyze`.

use anyhow::{bail, Result};
use decision_log::{
    config::AppConfig,
    session::{Session, SessionError},
    types::*,
    AssistError, SuggestionFailurePolicy,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Parsed command-line flags
#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    report_suggestion_failures: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let args = parse_args(&args[1..])?;

    // Diagnostics go to stderr so they never mix with table output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("decision_log=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = AppConfig::load(args.config_path.as_deref())?;
    if let Some(dir) = args.export_dir {
        config.export_dir = Some(dir);
    }
    if args.report_suggestion_failures {
        config.on_suggestion_failure = SuggestionFailurePolicy::Report;
    }

    let mut session = Session::from_config(&config);
    run_cli_mode(&mut session, &config).await
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();

    for arg in args {
        if let Some(path) = arg.strip_prefix("--config=") {
            parsed.config_path = Some(PathBuf::from(path));
        } else if let Some(dir) = arg.strip_prefix("--export-dir=") {
            parsed.export_dir = Some(PathBuf::from(dir));
        } else if arg == "--report-suggestion-failures" {
            parsed.report_suggestion_failures = true;
        } else {
            bail!("Unknown argument: {} (try --help)", arg);
        }
    }

    Ok(parsed)
}

fn print_usage() {
    println!("decision-log - Registro de Decisões");
    println!();
    println!("Usage: decision-log [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config=<path>                Config file (default: <config dir>/decision-log/config.json)");
    println!("  --export-dir=<dir>             Where /export writes CSV files");
    println!("  --report-suggestion-failures   Show unparseable AI suggestions as errors");
    println!("  -h, --help                     Show this help");
    println!();
    println!("Environment:");
    println!("  GEMINI_API_KEY                 Enables /suggest and /analyze");
    println!("  RUST_LOG                       Diagnostics filter (default: decision_log=warn)");
}

async fn run_cli_mode(session: &mut Session, config: &AppConfig) -> Result<()> {
    println!("Registro de Decisões");
    println!("====================");
    println!("Documentação de performance e impacto. /help para comandos, 'quit' para sair.");
    if !config.has_api_key() {
        println!("(GEMINI_API_KEY não definido: /suggest e /analyze ficam indisponíveis)");
    }
    println!();

    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let Some(line) = prompt(&mut input, "> ")? else {
            break;
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        if line.starts_with('/') {
            handle_command(session, config, &mut input, line).await?;
        } else {
            println!("Comando desconhecido. Tente /help");
        }
    }

    Ok(())
}

async fn handle_command(
    session: &mut Session,
    config: &AppConfig,
    input: &mut impl BufRead,
    line: &str,
) -> Result<()> {
    let parts: Vec<&str> = line.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/new" => {
            if fill_draft_interactively(session, input)? {
                submit_draft(session);
            }
        }
        "/suggest" => {
            if !session.draft().has_situation() && !fill_situation(session, input)? {
                return Ok(());
            }
            println!("✨ Gerando sugestão...");
            match session.request_suggestion().await {
                Ok(true) => {
                    print_draft(session.draft());
                    println!("Use /save para salvar ou /new para editar.");
                }
                Ok(false) => println!("Nenhuma sugestão aplicada."),
                Err(e) => report_ai_failure(&e),
            }
        }
        "/draft" => print_draft(session.draft()),
        "/save" => submit_draft(session),
        "/discard" => {
            session.reset_draft();
            println!("Rascunho descartado.");
        }
        "/analyze" => {
            println!("✨ Analisando padrões...");
            match session.request_analysis().await {
                Ok(Some(insights)) => print_insights(insights),
                Ok(None) => println!("A análise não retornou texto."),
                Err(e) => report_ai_failure(&e),
            }
        }
        "/insights" => match session.insights() {
            Some(insights) => print_insights(insights),
            None => println!("Nenhum insight. Use /analyze."),
        },
        "/clear-insights" => {
            session.clear_insights();
            println!("Insights removidos.");
        }
        "/list" => print_table(session.store().all()),
        "/delete" => match arg.parse::<RecordId>() {
            Ok(id) => {
                if session.delete(id) {
                    println!("Registro {} removido.", id);
                } else {
                    println!("Registro {} não encontrado.", id);
                }
            }
            Err(_) => println!("Usage: /delete <id>"),
        },
        "/export" => {
            if session.store().is_empty() {
                println!("Nada para exportar.");
                return Ok(());
            }
            let dir = if arg.is_empty() {
                config.export_dir()
            } else {
                PathBuf::from(arg)
            };
            match session.export(&dir) {
                Ok(path) => println!("📄 Relatório exportado: {}", path.display()),
                Err(e) => {
                    tracing::error!(error = %e, "Export failed");
                    println!("Falha ao exportar: {:#}", e);
                }
            }
        }
        "/guide" => print_guide(),
        "/how" => print_how_it_works(),
        "/help" => {
            println!("Commands:");
            println!("  /new              Novo registro (preenche e salva)");
            println!("  /suggest          ✨ Sugerir ação e resultado com IA");
            println!("  /draft            Mostrar o rascunho atual");
            println!("  /save             Salvar o rascunho atual");
            println!("  /discard          Descartar o rascunho");
            println!("  /analyze          ✨ Analisar padrões dos registros");
            println!("  /insights         Mostrar os últimos insights");
            println!("  /clear-insights   Remover os insights");
            println!("  /list             Listar registros (mais recentes primeiro)");
            println!("  /delete <id>      Remover um registro");
            println!("  /export [dir]     Exportar CSV");
            println!("  /guide            Como usar esta ferramenta");
            println!("  /how              How it works?");
            println!("  quit              Sair");
        }
        _ => {
            println!("Unknown command: {}. Try /help", cmd);
        }
    }

    Ok(())
}

/// Print `label`, read one line. `None` on end of input.
fn prompt(input: &mut impl BufRead, label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Like [`prompt`], asking again until the answer fits in `max` characters
fn prompt_bounded(input: &mut impl BufRead, label: &str, max: usize) -> Result<Option<String>> {
    loop {
        let Some(line) = prompt(input, label)? else {
            return Ok(None);
        };
        let len = line.chars().count();
        if len <= max {
            return Ok(Some(line));
        }
        println!("   {}/{}: texto longo demais, tente novamente.", len, max);
    }
}

/// Ask for situation and criticality. Returns false if input ended.
fn fill_situation(session: &mut Session, input: &mut impl BufRead) -> Result<bool> {
    let label = format!("Situação vivida (máx {}): ", SITUATION_MAX_CHARS);
    let Some(situation) = prompt_bounded(input, &label, SITUATION_MAX_CHARS)? else {
        return Ok(false);
    };
    session.draft_mut().situation = situation;
    let (counter, warn) = session.draft().situation_counter();
    println!("   {}{}", counter, if warn { " ⚠️" } else { "" });

    println!("Criticidade:");
    for (i, c) in Criticality::ALL.iter().enumerate() {
        println!("  {}. {} {} - {}", i + 1, c.emoji(), c.label(), c.description());
    }
    let Some(choice) = prompt(input, "Escolha [1]: ")? else {
        return Ok(false);
    };
    let criticality = if choice.trim().is_empty() {
        Criticality::default()
    } else {
        match Criticality::parse(&choice) {
            Some(c) => c,
            None => {
                println!("Opção inválida, usando '{}'.", Criticality::default());
                Criticality::default()
            }
        }
    };
    session.draft_mut().criticality = criticality;
    Ok(true)
}

/// Walk through every field. Returns false if input ended.
fn fill_draft_interactively(
    session: &mut Session,
    input: &mut impl BufRead,
) -> Result<bool> {
    if !fill_situation(session, input)? {
        return Ok(false);
    }

    let label = format!("Ação tomada (máx {}): ", ACTION_MAX_CHARS);
    let Some(action) = prompt_bounded(input, &label, ACTION_MAX_CHARS)? else {
        return Ok(false);
    };
    session.draft_mut().action = action;
    let (counter, warn) = session.draft().action_counter();
    println!("   {}{}", counter, if warn { " ⚠️" } else { "" });

    let Some(result) = prompt(input, "Resultado da decisão: ")? else {
        return Ok(false);
    };
    session.draft_mut().result = result;
    Ok(true)
}

fn submit_draft(session: &mut Session) {
    match session.submit() {
        Ok(id) => println!("💾 Registro salvo (id {}).", id),
        Err(e) => println!("Não foi possível salvar: {}", e),
    }
}

/// Full error goes to the diagnostic channel; the user gets a short notice
fn report_ai_failure(err: &SessionError) {
    match err {
        SessionError::Busy => println!("Aguarde: já existe uma solicitação em andamento."),
        SessionError::Assist(AssistError::EmptyInput(reason)) => println!("Nada a fazer: {}.", reason),
        SessionError::Assist(AssistError::StructuralParse(_)) => {
            tracing::error!(error = %err, "AI suggestion unusable");
            println!("A IA respondeu em um formato inesperado.");
        }
        other => {
            tracing::error!(error = %other, "AI request failed");
            println!("A solicitação à IA falhou.");
        }
    }
}

fn print_draft(draft: &RecordDraft) {
    println!();
    println!("┌─ Rascunho ─────────────────────────────────────────────");
    println!("│ Situação:    {}", draft.situation);
    println!("│ Criticidade: {} {}", draft.criticality.emoji(), draft.criticality);
    println!("│ Ação:        {}", wrap_text(&draft.action, 60, "│              "));
    println!("│ Resultado:   {}", wrap_text(&draft.result, 60, "│              "));
    println!("└────────────────────────────────────────────────────────");
    println!();
}

fn print_insights(insights: &str) {
    println!();
    println!("📊 Insights Estratégicos ✨");
    println!("────────────────────────────────────────────────────────");
    println!("{}", insights);
    println!();
}

fn print_table(records: &[DecisionRecord]) {
    if records.is_empty() {
        println!("Nenhum registro encontrado. Comece com /new.");
        return;
    }

    println!();
    println!(
        "{:<14} {:<10} {:<30} {:<26} {:<30} {}",
        "ID", "Data", "Situação", "Criticidade", "Ação", "Resultado"
    );
    println!("{}", "─".repeat(140));
    for record in records {
        println!(
            "{:<14} {:<10} {:<30} {} {:<23} {:<30} \"{}\"",
            record.id,
            record.display_date(),
            truncate(&record.situation, 30),
            record.criticality.emoji(),
            truncate(record.criticality.label(), 23),
            truncate(&record.action, 30),
            truncate(&record.result, 30),
        );
    }
    println!();
}

fn print_guide() {
    println!();
    println!("📖 COMO USAR ESTA FERRAMENTA");
    println!("  1. Situação     Descreva brevemente o evento ou desafio enfrentado (máx. 100 caracteres).");
    println!("  2. Criticidade  Classifique o impacto segundo a Matriz de Eisenhower (Urgência x Importância).");
    println!("  3. Ação Tomada  O que foi feito? Descreva em até 240 caracteres ou use /suggest.");
    println!("  4. Resultado    Qual o efeito no negócio, time ou cliente? Foque em métricas ou feedbacks.");
    println!();
}

fn print_how_it_works() {
    println!();
    println!("❓ HOW IT WORKS?");
    println!();
    println!("O objetivo da ferramenta:");
    println!("  Documentar marcos de performance, dando clareza sobre o valor entregue");
    println!("  e sobre como o tempo é gerido.");
    println!();
    println!("Integração Gemini AI ✨:");
    println!("  /suggest  Analisa a situação e propõe redações executivas para ações e resultados.");
    println!("  /analyze  Examina o conjunto de registros para identificar tendências e gargalos.");
    println!();
    println!("Valor para o profissional:");
    println!("  ✅ Visibilidade: histórico concreto para conversas de 1:1 e promoções.");
    println!("  ✅ Alocação de energia: tempo gasto em \"apagar incêndios\" ou em temas estratégicos?");
    println!("  ✅ Aprendizagem: análise crítica das decisões tomadas e seus efeitos reais.");
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", truncate_chars(s, max.saturating_sub(3)))
    }
}

fn wrap_text(s: &str, width: usize, prefix: &str) -> String {
    let mut result = String::new();
    let mut line = String::new();

    for word in s.split_whitespace() {
        if !line.is_empty() && line.chars().count() + word.chars().count() + 1 > width {
            if !result.is_empty() {
                result.push('\n');
                result.push_str(prefix);
            }
            result.push_str(&line);
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }

    if !line.is_empty() {
        if !result.is_empty() {
            result.push('\n');
            result.push_str(prefix);
        }
        result.push_str(&line);
    }

    result
}
