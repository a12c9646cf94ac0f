//! Interactive wizard session
//!
//! Drives the step machine from a terminal: paints the current step,
//! reads input with rustyline, and forwards actions to the wizard. All
//! flow decisions live in the machine; this layer only collects text
//! and displays state.

use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, NaiveTime};
use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::backend::{BackendClient, SaveStatus};
use crate::config::Config;
use crate::llm;
use crate::methods::{ALL_METHODS, MBTI_TYPES, Method, MethodInput};
use crate::render::{Block, Span};
use crate::wizard::{NextOutcome, Report, Step, Wizard};

/// Run one full interactive reading
pub async fn run_wizard(config: &Config) -> Result<()> {
    let client = llm::create_client(&config.llm)?;
    let backend = BackendClient::from_config(&config.backend).map(Arc::new);
    let wizard = Wizard::new(client, backend, config.llm.model.clone());

    let mut repl = WizardRepl::new(wizard)?;
    repl.run().await
}

/// Terminal driver for the wizard
struct WizardRepl {
    wizard: Wizard,
    rl: DefaultEditor,
}

impl WizardRepl {
    fn new(wizard: Wizard) -> Result<Self> {
        let rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
        Ok(Self { wizard, rl })
    }

    async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            self.print_error();
            let keep_going = match self.wizard.state.step {
                Step::Demographics => self.step_demographics()?,
                Step::MethodSelection => self.step_method_selection()?,
                Step::InputForm => self.step_input_form().await?,
                Step::Generating => {
                    // The machine never yields control while in this state
                    unreachable!("wizard loop observed the Generating step")
                }
                Step::ReportView => self.step_report_view().await?,
                Step::Chat => self.step_chat().await?,
            };
            if !keep_going {
                break;
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Divinator".bright_magenta().bold());
        println!("Multi-method divination readings, with a companion to discuss them.");
        println!();
    }

    fn print_error(&mut self) {
        if let Some(error) = self.wizard.state.error.clone() {
            println!("{} {}", "!".red().bold(), error.red());
            self.wizard.state.clear_error();
        }
    }

    /// Read one line; `None` means the user wants out (Ctrl+C / Ctrl+D)
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    let _ = self.rl.add_history_entry(&trimmed);
                }
                Ok(Some(trimmed))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                Ok(None)
            }
            Err(err) => Err(eyre::eyre!("Readline error: {}", err)),
        }
    }

    fn step_demographics(&mut self) -> Result<bool> {
        println!("{}", "Welcome! Let's begin with a little about you.".bright_cyan());

        let Some(name) = self.read_line(&format!("{} ", "Your name:".bright_green()))? else {
            return Ok(false);
        };
        let Some(question) = self.read_line(&format!(
            "{} ",
            "Your question or area of interest:".bright_green()
        ))?
        else {
            return Ok(false);
        };

        self.wizard.submit_demographics(&name, &question);
        Ok(true)
    }

    fn step_method_selection(&mut self) -> Result<bool> {
        println!();
        println!("{}", "Choose your divination methods:".bright_cyan());
        for (i, method) in ALL_METHODS.iter().enumerate() {
            let mark = if self.wizard.state.selected.contains(method) {
                "[x]".bright_green()
            } else {
                "[ ]".dimmed()
            };
            println!("  {} {} {} - {}", i + 1, mark, method.display_name().bold(), method.description().dimmed());
        }
        println!(
            "Enter a number to toggle, {} to continue, {} to go back.",
            "done".yellow(),
            "back".yellow()
        );

        let Some(input) = self.read_line(&format!("{} ", ">".bright_green()))? else {
            return Ok(false);
        };

        match input.to_lowercase().as_str() {
            "done" => self.wizard.proceed_to_inputs(),
            "back" => self.wizard.back_to_demographics(),
            other => match other.parse::<usize>() {
                Ok(n) if (1..=ALL_METHODS.len()).contains(&n) => {
                    self.wizard.toggle_method(ALL_METHODS[n - 1]);
                }
                _ => println!("{} Enter 1-{}, done, or back", "?".yellow(), ALL_METHODS.len()),
            },
        }
        Ok(true)
    }

    async fn step_input_form(&mut self) -> Result<bool> {
        let Some(method) = self.wizard.state.current_method() else {
            // The machine resets to method selection on the next action
            self.wizard.proceed_to_inputs();
            return Ok(true);
        };

        println!();
        println!(
            "{} ({} of {})",
            method.display_name().bright_cyan().bold(),
            self.wizard.state.input_cursor + 1,
            self.wizard.state.inputs.len()
        );
        println!("{}", method.description().dimmed());
        println!("{}", "Type back at any prompt to return.".dimmed());

        let input = match self.collect_input(method)? {
            Collected::Input(input) => input,
            Collected::Back => {
                self.wizard.previous_input();
                return Ok(true);
            }
            Collected::Quit => return Ok(false),
        };

        self.wizard.update_input(input);
        if self.wizard.next_input() == NextOutcome::Complete {
            println!();
            println!("{}", "Consulting the oracle, this may take a moment...".bright_magenta());
            self.wizard.generate_reports().await;
        }
        Ok(true)
    }

    fn collect_input(&mut self, method: Method) -> Result<Collected> {
        match method {
            Method::LifePathNumber => {
                let Some(dob) = self.prompt_date("Date of birth (YYYY-MM-DD):")? else {
                    return Ok(Collected::Quit);
                };
                if dob == "back" {
                    return Ok(Collected::Back);
                }
                Ok(Collected::Input(MethodInput::LifePath { date_of_birth: dob }))
            }
            Method::Palmistry => self.collect_palm_image(),
            Method::Astrology => {
                let Some(dob) = self.prompt_date("Date of birth (YYYY-MM-DD):")? else {
                    return Ok(Collected::Quit);
                };
                if dob == "back" {
                    return Ok(Collected::Back);
                }
                let Some(tob) = self.prompt_time("Time of birth (HH:MM):")? else {
                    return Ok(Collected::Quit);
                };
                if tob == "back" {
                    return Ok(Collected::Back);
                }
                let Some(pob) = self.read_line(&format!("{} ", "Place of birth:".bright_green()))? else {
                    return Ok(Collected::Quit);
                };
                if pob == "back" {
                    return Ok(Collected::Back);
                }
                Ok(Collected::Input(MethodInput::Astrology {
                    date_of_birth: dob,
                    time_of_birth: tob,
                    place_of_birth: pob,
                }))
            }
            Method::Mbti => {
                println!("{}", MBTI_TYPES.join(", ").dimmed());
                loop {
                    let Some(code) = self.read_line(&format!("{} ", "Your MBTI type:".bright_green()))? else {
                        return Ok(Collected::Quit);
                    };
                    if code == "back" {
                        return Ok(Collected::Back);
                    }
                    let code = code.to_uppercase();
                    if MBTI_TYPES.contains(&code.as_str()) {
                        return Ok(Collected::Input(MethodInput::Mbti { type_code: code }));
                    }
                    println!("{} Not one of the 16 MBTI codes", "?".yellow());
                }
            }
            Method::Tarot => {
                let Some(answer) = self.read_line(&format!(
                    "{} ",
                    "Press Enter to draw your cards (or type back):".bright_green()
                ))?
                else {
                    return Ok(Collected::Quit);
                };
                if answer == "back" {
                    return Ok(Collected::Back);
                }
                println!("{}", "The cards have been drawn.".bright_magenta());
                Ok(Collected::Input(MethodInput::Tarot { reading_initiated: true }))
            }
        }
    }

    fn collect_palm_image(&mut self) -> Result<Collected> {
        loop {
            let Some(path) = self.read_line(&format!("{} ", "Path to a palm photo (JPEG):".bright_green()))? else {
                return Ok(Collected::Quit);
            };
            if path == "back" {
                return Ok(Collected::Back);
            }
            match std::fs::read(&path) {
                Ok(bytes) => {
                    info!(%path, bytes = bytes.len(), "collect_palm_image: loaded");
                    let file_name = Path::new(&path)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned());
                    return Ok(Collected::Input(MethodInput::Palmistry {
                        image_base64: Some(BASE64.encode(bytes)),
                        file_name,
                    }));
                }
                Err(e) => println!("{} Could not read {}: {}", "?".yellow(), path, e),
            }
        }
    }

    /// Prompt until a valid date (or back/quit)
    fn prompt_date(&mut self, label: &str) -> Result<Option<String>> {
        loop {
            let Some(value) = self.read_line(&format!("{} ", label.bright_green()))? else {
                return Ok(None);
            };
            if value == "back" || NaiveDate::parse_from_str(&value, "%Y-%m-%d").is_ok() {
                return Ok(Some(value));
            }
            println!("{} Use YYYY-MM-DD, e.g. 1990-04-12", "?".yellow());
        }
    }

    /// Prompt until a valid time (or back/quit)
    fn prompt_time(&mut self, label: &str) -> Result<Option<String>> {
        loop {
            let Some(value) = self.read_line(&format!("{} ", label.bright_green()))? else {
                return Ok(None);
            };
            if value == "back" || NaiveTime::parse_from_str(&value, "%H:%M").is_ok() {
                return Ok(Some(value));
            }
            println!("{} Use HH:MM, e.g. 08:30", "?".yellow());
        }
    }

    async fn step_report_view(&mut self) -> Result<bool> {
        println!();
        for report in &self.wizard.state.individual_reports {
            self.paint_report(report);
        }
        if let Some(integrated) = self.wizard.state.integrated_report.clone() {
            self.paint_report(&integrated);
        }

        if !self.wizard.state.archetype_tags.is_empty() {
            println!("{} {}", "Your archetypes:".bright_cyan(), self.wizard.state.archetype_tags.join(" | ").bright_yellow());
        }
        if !self.wizard.state.sources.is_empty() {
            println!("{}", "Sources:".bright_cyan());
            for source in &self.wizard.state.sources {
                println!("  {} {}", source.title.bold(), source.uri.dimmed().underline());
            }
        }
        self.print_save_status();

        println!();
        println!(
            "Commands: {} to discuss with Aura, {} to revise inputs, {} to retry saving, {} to start over, {} to leave.",
            "chat".yellow(),
            "edit".yellow(),
            "save".yellow(),
            "restart".yellow(),
            "quit".yellow()
        );

        loop {
            let Some(input) = self.read_line(&format!("{} ", ">".bright_green()))? else {
                return Ok(false);
            };
            match input.to_lowercase().as_str() {
                "chat" => {
                    self.wizard.initiate_chat().await;
                    return Ok(true);
                }
                "edit" => {
                    self.wizard.edit_inputs();
                    return Ok(true);
                }
                "save" => {
                    match self.wizard.save_status() {
                        SaveStatus::Failed(_) => {
                            self.wizard.retry_save();
                            println!("{}", "Retrying save...".dimmed());
                        }
                        status => debug!(?status, "step_report_view: no retry needed"),
                    }
                    self.print_save_status();
                }
                "restart" => {
                    self.wizard.restart();
                    return Ok(true);
                }
                "quit" | "exit" => return Ok(false),
                _ => println!("{} Unknown command: {}", "?".yellow(), input),
            }
        }
    }

    fn print_save_status(&self) {
        match self.wizard.save_status() {
            SaveStatus::Idle => {}
            SaveStatus::InFlight => println!("{}", "Saving your reading...".dimmed()),
            SaveStatus::Succeeded => println!("{}", "Reading saved.".bright_green()),
            SaveStatus::Failed(message) => {
                println!("{} {} ({})", "!".red(), "Saving failed; type save to retry.".red(), message.dimmed());
            }
        }
    }

    async fn step_chat(&mut self) -> Result<bool> {
        // Show only messages we have not painted yet: on entry that is the
        // greeting, afterwards each reply is painted as it arrives
        if let Some(greeting) = self.wizard.state.chat_messages.first().cloned()
            && self.wizard.state.chat_messages.len() == 1
        {
            println!();
            println!("{} {}", "Aura:".bright_blue().bold(), greeting.text);
            println!("{}", "Type /end to return to your reports.".dimmed());
        }

        let Some(input) = self.read_line(&format!("{} ", "you>".bright_green()))? else {
            return Ok(false);
        };
        if input.is_empty() {
            return Ok(true);
        }
        if input == "/end" {
            self.wizard.end_chat();
            return Ok(true);
        }

        self.wizard.send_chat(&input).await;
        if let Some(reply) = self.wizard.state.chat_messages.last() {
            println!("{} {}", "Aura:".bright_blue().bold(), reply.text);
        }
        Ok(true)
    }

    fn paint_report(&self, report: &Report) {
        println!();
        println!("{}", format!("=== {} ===", report.title).bright_magenta().bold());
        for block in crate::render::parse(&report.content) {
            self.paint_block(&block);
        }
    }

    fn paint_block(&self, block: &Block) {
        match block {
            Block::Heading { level, spans } => {
                let text = paint_spans(spans);
                match level {
                    1 => println!("\n{}", text.bright_cyan().bold()),
                    2 => println!("\n{}", text.bright_cyan()),
                    _ => println!("\n{}", text.cyan()),
                }
            }
            Block::Paragraph(spans) => println!("{}", paint_spans(spans)),
            Block::UnorderedList(items) => {
                for item in items {
                    println!("  {} {}", "-".bright_magenta(), paint_spans(item));
                }
            }
            Block::OrderedList(items) => {
                for (i, item) in items.iter().enumerate() {
                    println!("  {} {}", format!("{}.", i + 1).bright_magenta(), paint_spans(item));
                }
            }
        }
    }
}

/// What the per-method collector produced
enum Collected {
    Input(MethodInput),
    Back,
    Quit,
}

fn paint_spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Text(text) => text.normal().to_string(),
            Span::Emphasis(text) => text.italic().to_string(),
            Span::Strong(text) => text.bold().to_string(),
        })
        .collect()
}
